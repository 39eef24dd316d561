//! Core Database Backend Traits
//!
//! The versioning engine and the introspectors only ever talk to a database
//! through these traits, so any driver (or an in-memory recorder in tests)
//! can sit underneath them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{MigrateError, MigrateResult};

/// A transaction spanning one forward or rollback batch
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement and return the affected row count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>>;

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrateResult<Option<DatabaseRow>>;

    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Connection pool abstraction
#[async_trait]
pub trait DatabasePool: Send + Sync {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>>;

    /// Run a query outside any transaction (catalog reads, history listing)
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>>;

    async fn close(&self);

    /// What the connection knows about the server, used for dialect detection
    fn metadata(&self) -> ConnectionMetadata;
}

/// Server facts available for dialect auto-detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionMetadata {
    pub product_name: Option<String>,
    pub url: Option<String>,
    pub driver_name: Option<String>,
}

impl ConnectionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_name(mut self, product: impl Into<String>) -> Self {
        self.product_name = Some(product.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn driver_name(mut self, driver: impl Into<String>) -> Self {
        self.driver_name = Some(driver.into());
        self
    }
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600), // 10 minutes
            max_lifetime_seconds: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

/// Parameter and column values exchanged with the database
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; catalogs sometimes hand numbers back as text
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(*b as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view accepting the `YES`/`NO`, `t`/`f` and `0`/`1` spellings
    /// information_schema and system views use
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(b) => Some(*b),
            DatabaseValue::Int32(i) => Some(*i != 0),
            DatabaseValue::Int64(i) => Some(*i != 0),
            DatabaseValue::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "T" | "TRUE" | "1" => Some(true),
                "NO" | "N" | "F" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .ok()
                        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
                }),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A fully decoded result row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<String>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn get_by_index(&self, index: usize) -> MigrateResult<&DatabaseValue> {
        self.values
            .get(index)
            .ok_or_else(|| MigrateError::Catalog(format!("Column index {} out of range", index)))
    }

    /// Column lookup is case-insensitive; Oracle and H2 report upper-case names
    pub fn get_by_name(&self, name: &str) -> MigrateResult<&DatabaseValue> {
        let index = self
            .columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' not found", name)))?;
        self.get_by_index(index)
    }

    pub fn get_string(&self, name: &str) -> MigrateResult<String> {
        self.get_optional_string(name)?
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' is null", name)))
    }

    pub fn get_optional_string(&self, name: &str) -> MigrateResult<Option<String>> {
        match self.get_by_name(name)? {
            DatabaseValue::Null => Ok(None),
            DatabaseValue::String(s) => Ok(Some(s.clone())),
            DatabaseValue::Int32(i) => Ok(Some(i.to_string())),
            DatabaseValue::Int64(i) => Ok(Some(i.to_string())),
            DatabaseValue::Bool(b) => Ok(Some(b.to_string())),
            DatabaseValue::DateTime(dt) => Ok(Some(dt.to_rfc3339())),
        }
    }

    pub fn get_i64(&self, name: &str) -> MigrateResult<i64> {
        self.get_optional_i64(name)?
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' is null", name)))
    }

    pub fn get_optional_i64(&self, name: &str) -> MigrateResult<Option<i64>> {
        let value = self.get_by_name(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_i64()
            .map(Some)
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' is not an integer: {:?}", name, value)))
    }

    pub fn get_bool(&self, name: &str) -> MigrateResult<bool> {
        let value = self.get_by_name(name)?;
        value
            .as_bool()
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' is not a boolean: {:?}", name, value)))
    }

    /// Like [`get_bool`](Self::get_bool), reading null as `false`
    pub fn get_optional_bool(&self, name: &str) -> MigrateResult<bool> {
        if self.get_by_name(name)?.is_null() {
            return Ok(false);
        }
        self.get_bool(name)
    }

    pub fn get_datetime(&self, name: &str) -> MigrateResult<DateTime<Utc>> {
        let value = self.get_by_name(name)?;
        value
            .as_datetime()
            .ok_or_else(|| MigrateError::Catalog(format!("Column '{}' is not a timestamp: {:?}", name, value)))
    }
}
