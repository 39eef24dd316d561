//! Migration configuration
//!
//! Settings can be built in code or loaded from the environment:
//!
//! | Variable                 | Field           |
//! |--------------------------|-----------------|
//! | `TIDEMARK_HISTORY_TABLE` | `history_table` |
//! | `TIDEMARK_SCHEMA`        | `schema`        |
//! | `TIDEMARK_DIALECT`       | `dialect`       |
//! | `DATABASE_URL`           | `database_url`  |

use std::env;

use thiserror::Error;

use crate::dialect::canonical_dialect_name;

/// Default name of the change set history table
pub const DEFAULT_HISTORY_TABLE: &str = "change_set_history";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

/// Configuration for the versioning engine and introspectors
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationConfig {
    /// Table used to record applied change sets
    pub history_table: String,
    /// Schema (or database, for MySQL) to introspect; `None` means the connection default
    pub schema: Option<String>,
    /// Explicit dialect name; `None` means auto-detect
    pub dialect: Option<String>,
    /// Connection URL
    pub database_url: Option<String>,
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self {
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            schema: None,
            dialect: None,
            database_url: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(table) = env::var("TIDEMARK_HISTORY_TABLE") {
            config.history_table = table;
        }

        config.schema = env::var("TIDEMARK_SCHEMA").ok().filter(|s| !s.is_empty());

        if let Ok(dialect) = env::var("TIDEMARK_DIALECT") {
            let canonical = canonical_dialect_name(&dialect).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "dialect".to_string(),
                    value: dialect.clone(),
                    expected: "postgresql, mysql, mariadb, oracle, sqlserver or h2".to_string(),
                }
            })?;
            config.dialect = Some(canonical.to_string());
        }

        config.database_url = env::var("DATABASE_URL").ok();

        config.validate()?;
        Ok(config)
    }

    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = table.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Name of the sequence backing the history table's id column
    pub fn history_sequence(&self) -> String {
        format!("{}_id_seq", self.history_table)
    }

    /// Require a database URL, for callers that are about to connect
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar {
                var: "DATABASE_URL".to_string(),
            })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.history_table) {
            return Err(ConfigError::ValidationFailed {
                field: "history_table".to_string(),
                reason: format!(
                    "'{}' must start with a letter or underscore and contain only letters, digits and underscores",
                    self.history_table
                ),
            });
        }

        if let Some(schema) = &self.schema {
            if !is_plain_identifier(schema) {
                return Err(ConfigError::ValidationFailed {
                    field: "schema".to_string(),
                    reason: format!("'{}' is not a plain identifier", schema),
                });
            }
        }

        if let Some(dialect) = &self.dialect {
            if canonical_dialect_name(dialect).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "dialect".to_string(),
                    value: dialect.clone(),
                    expected: "a registered dialect name".to_string(),
                });
            }
        }

        if let Some(database_url) = &self.database_url {
            // JDBC-style URLs are accepted for dialect detection only
            let candidate = database_url.strip_prefix("jdbc:").unwrap_or(database_url);
            url::Url::parse(candidate).map_err(|e| ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: database_url.clone(),
                expected: format!("a valid connection URL ({})", e),
            })?;
        }

        Ok(())
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env() {
        env::remove_var("TIDEMARK_HISTORY_TABLE");
        env::remove_var("TIDEMARK_SCHEMA");
        env::remove_var("TIDEMARK_DIALECT");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_defaults_from_empty_env() {
        clean_env();

        let config = MigrationConfig::from_env().unwrap();
        assert_eq!(config.history_table, "change_set_history");
        assert_eq!(config.history_sequence(), "change_set_history_id_seq");
        assert!(config.schema.is_none());
        assert!(config.dialect.is_none());
        assert!(config.require_database_url().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_all_fields() {
        clean_env();
        env::set_var("TIDEMARK_HISTORY_TABLE", "schema_log");
        env::set_var("TIDEMARK_SCHEMA", "app");
        env::set_var("TIDEMARK_DIALECT", "postgres");
        env::set_var("DATABASE_URL", "postgres://localhost/app");

        let config = MigrationConfig::from_env().unwrap();
        assert_eq!(config.history_table, "schema_log");
        assert_eq!(config.schema.as_deref(), Some("app"));
        assert_eq!(config.dialect.as_deref(), Some("postgresql"));
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/app");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_unknown_dialect_is_rejected() {
        clean_env();
        env::set_var("TIDEMARK_DIALECT", "db2");

        let result = MigrationConfig::from_env();
        match result {
            Err(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "dialect");
                assert_eq!(value, "db2");
            }
            other => panic!("Expected InvalidValue error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    fn test_history_table_must_be_identifier() {
        let config = MigrationConfig::new().with_history_table("history; drop table users");
        match config.validate() {
            Err(ConfigError::ValidationFailed { field, .. }) => assert_eq!(field, "history_table"),
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_jdbc_url_is_accepted() {
        let config = MigrationConfig::new().with_database_url("jdbc:postgresql://localhost:5432/app");
        assert!(config.validate().is_ok());
    }
}
