//! Dialect registry and auto-detection
//!
//! A dialect bundles the DDL generator (through a [`MigrateEngine`]) with the
//! matching catalog reader. The registry keeps dialects in registration
//! order; detection falls back to the first one when nothing matches.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backends::{ConnectionMetadata, DatabasePool};
use crate::change::Change;
use crate::config::MigrationConfig;
use crate::ddl::{
    DdlGenerator, H2DdlGenerator, MySqlDdlGenerator, OracleDdlGenerator, PostgresDdlGenerator,
    SqlServerDdlGenerator,
};
use crate::engine::MigrateEngine;
use crate::error::{MigrateError, MigrateResult};
use crate::introspect::{
    CatalogScope, H2Introspector, Introspector, MySqlIntrospector, OracleIntrospector,
    PostgresIntrospector, SqlServerIntrospector,
};
use crate::versioning::VersioningEngine;

/// Map a dialect name or alias to its registered name
pub fn canonical_dialect_name(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "postgresql" | "postgres" | "pg" => Some("postgresql"),
        "mysql" => Some("mysql"),
        "mariadb" => Some("mariadb"),
        "sqlserver" | "mssql" => Some("sqlserver"),
        "oracle" => Some("oracle"),
        "h2" => Some("h2"),
        _ => None,
    }
}

fn dialect_from_text(text: &str) -> Option<&'static str> {
    let lower = text.to_ascii_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();
    let has = |name: &str| tokens.iter().any(|token| *token == name);

    // MariaDB servers and drivers often mention MySQL too
    if has("mariadb") {
        Some("mariadb")
    } else if has("mysql") {
        Some("mysql")
    } else if has("postgresql") || has("postgres") || has("pgsql") {
        Some("postgresql")
    } else if has("sqlserver") || has("mssql") || (has("sql") && has("server")) {
        Some("sqlserver")
    } else if has("oracle") {
        Some("oracle")
    } else if has("h2") {
        Some("h2")
    } else {
        None
    }
}

/// Scheme of a connection URL, looking past a `jdbc:` prefix
fn url_scheme(url: &str) -> &str {
    let url = url.trim();
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    url.split(':').next().unwrap_or(url)
}

/// Guess the dialect from what a connection reports.
///
/// The product name wins over the URL scheme, which wins over the driver
/// name. Returns `None` when none of them is recognised.
pub fn detect_dialect_name(
    product_name: Option<&str>,
    url: Option<&str>,
    driver_name: Option<&str>,
) -> Option<&'static str> {
    product_name
        .and_then(dialect_from_text)
        .or_else(|| url.map(url_scheme).and_then(dialect_from_text))
        .or_else(|| driver_name.and_then(dialect_from_text))
}

/// DDL generation and introspection for one database
#[derive(Debug, Clone)]
pub struct Dialect {
    pub name: String,
    pub engine: MigrateEngine,
    pub introspector: Arc<dyn Introspector>,
}

impl Dialect {
    pub fn new(
        name: impl Into<String>,
        generator: Arc<dyn DdlGenerator>,
        introspector: Arc<dyn Introspector>,
    ) -> Self {
        Self {
            name: name.into(),
            engine: MigrateEngine::new(generator),
            introspector,
        }
    }

    /// Versioning engine running this dialect's DDL on `pool`
    pub fn versioning(&self, pool: Arc<dyn DatabasePool>, config: MigrationConfig) -> VersioningEngine {
        VersioningEngine::new(pool, self.engine.clone(), config)
    }

    /// Read the schema `config` points at as an ordered change list
    pub async fn capture(&self, pool: &dyn DatabasePool, config: &MigrationConfig) -> MigrateResult<Vec<Change>> {
        self.introspector.capture(pool, &CatalogScope::from(config)).await
    }
}

/// Registered dialects, in registration order
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: Vec<Dialect>,
}

impl DialectRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// PostgreSQL, MySQL, MariaDB, SQL Server, Oracle and H2; PostgreSQL is the fallback
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Dialect::new(
            "postgresql",
            Arc::new(PostgresDdlGenerator::new()),
            Arc::new(PostgresIntrospector::new()),
        ));
        registry.register(Dialect::new(
            "mysql",
            Arc::new(MySqlDdlGenerator::mysql()),
            Arc::new(MySqlIntrospector::mysql()),
        ));
        registry.register(Dialect::new(
            "mariadb",
            Arc::new(MySqlDdlGenerator::mariadb()),
            Arc::new(MySqlIntrospector::mariadb()),
        ));
        registry.register(Dialect::new(
            "sqlserver",
            Arc::new(SqlServerDdlGenerator::new()),
            Arc::new(SqlServerIntrospector::new()),
        ));
        registry.register(Dialect::new(
            "oracle",
            Arc::new(OracleDdlGenerator::new()),
            Arc::new(OracleIntrospector::new()),
        ));
        registry.register(Dialect::new(
            "h2",
            Arc::new(H2DdlGenerator::new()),
            Arc::new(H2Introspector::new()),
        ));
        registry
    }

    /// Register a dialect, replacing any existing one with the same name
    pub fn register(&mut self, dialect: Dialect) {
        match self.dialects.iter_mut().find(|d| d.name == dialect.name) {
            Some(existing) => *existing = dialect,
            None => self.dialects.push(dialect),
        }
    }

    /// Look a dialect up by name or alias
    pub fn get(&self, name: &str) -> MigrateResult<&Dialect> {
        let wanted = canonical_dialect_name(name).unwrap_or(name);
        self.dialects
            .iter()
            .find(|dialect| dialect.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MigrateError::DialectNotFound(name.to_string()))
    }

    /// Pick the dialect for a connection, falling back to the first registered one
    pub fn detect(&self, metadata: &ConnectionMetadata) -> MigrateResult<&Dialect> {
        let detected = detect_dialect_name(
            metadata.product_name.as_deref(),
            metadata.url.as_deref(),
            metadata.driver_name.as_deref(),
        );

        if let Some(name) = detected {
            if let Ok(dialect) = self.get(name) {
                debug!("Detected dialect {} from connection metadata", dialect.name);
                return Ok(dialect);
            }
        }

        let fallback = self
            .dialects
            .first()
            .ok_or_else(|| MigrateError::DialectNotFound(detected.unwrap_or("unknown").to_string()))?;
        warn!(
            "Could not detect a registered dialect from {:?}, using {}",
            metadata, fallback.name
        );
        Ok(fallback)
    }

    /// The configured dialect if one is set, otherwise the detected one
    pub fn resolve(&self, config: &MigrationConfig, pool: &dyn DatabasePool) -> MigrateResult<&Dialect> {
        match &config.dialect {
            Some(name) => self.get(name),
            None => self.detect(&pool.metadata()),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.dialects.iter().map(|dialect| dialect.name.as_str()).collect()
    }
}
