//! # tidemark-migrate: Schema Migrations for tidemark
//!
//! Typed schema changes rendered per SQL dialect, applied and reverted in
//! locked transactions with a history table, and recovered from a live
//! database through catalog introspection.
//!
//! Supported dialects: PostgreSQL, MySQL, MariaDB, SQL Server, Oracle and H2.
//! PostgreSQL and MySQL/MariaDB connections are provided through sqlx; other
//! databases plug in through the [`DatabasePool`] trait.

pub mod backends;
pub mod change;
pub mod config;
pub mod ddl;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod versioning;

// Re-export core types
pub use backends::{
    ConnectionMetadata, DatabasePool, DatabasePoolConfig, DatabaseRow, DatabaseTransaction,
    DatabaseValue, MySqlPool, PostgresPool,
};
pub use change::*;
pub use config::*;
pub use ddl::DdlGenerator;
pub use dialect::*;
pub use engine::*;
pub use error::*;
pub use introspect::{CatalogScope, Introspector};
pub use versioning::*;
