//! Error types for the migration engine
//!
//! Covers DDL generation failures, dependency errors found during
//! introspection, and database/transaction failures raised while applying
//! change sets.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The dialect cannot express the requested change
    #[error("{message}")]
    Unsupported { dialect: String, message: String },

    /// A data type change has no recorded previous type to restore
    #[error("Cannot roll back data type change of {table}.{column}: previous type is unknown")]
    MissingRollbackType { table: String, column: String },

    /// Foreign keys between tables form a cycle
    #[error("Circular foreign key dependency detected involving table '{table}'")]
    CircularDependency { table: String },

    /// No dialect registered under the requested name
    #[error("No dialect registered for '{0}'")]
    DialectNotFound(String),

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(String),

    /// Transaction lifecycle error (begin/commit)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A DDL statement failed while applying or reverting a change set
    #[error("Failed to execute change set {change_set_id}: {message}\n  Statement: {statement}")]
    Execution {
        change_set_id: String,
        statement: String,
        message: String,
    },

    /// The original failure, plus the failure of the rollback that followed it
    #[error("{original} (rollback also failed: {rollback})")]
    RollbackFailed {
        original: Box<MigrateError>,
        rollback: Box<MigrateError>,
    },

    /// Catalog row did not have the expected shape
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MigrateError {
    /// Create an Unsupported error for a dialect
    pub fn unsupported(dialect: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Unsupported {
            dialect: dialect.into(),
            message: message.into(),
        }
    }

    /// Create an Execution error with the failing statement attached
    pub fn execution(
        change_set_id: impl Into<String>,
        statement: impl Into<String>,
        source: impl std::fmt::Display,
    ) -> Self {
        MigrateError::Execution {
            change_set_id: change_set_id.into(),
            statement: statement.into(),
            message: source.to_string(),
        }
    }

    /// The error that started the failure, looking through rollback wrappers
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::RollbackFailed { original, .. } => original.root(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Database(err.to_string())
    }
}
