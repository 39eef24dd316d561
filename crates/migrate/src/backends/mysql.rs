//! MySQL / MariaDB Backend Implementation
//!
//! Both servers speak the same protocol; the product name reported in the
//! connection metadata comes from `select version()`, which carries a
//! `MariaDB` suffix on MariaDB servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, Pool};
use tracing::debug;

use super::core::*;
use super::redact_url;
use crate::error::{MigrateError, MigrateResult};

/// MySQL or MariaDB connection pool
pub struct MySqlPool {
    pool: Arc<Pool<MySql>>,
    url: Option<String>,
    product_name: String,
}

impl MySqlPool {
    /// Wrap an existing sqlx pool; `product_name` is `MySQL` or `MariaDB`
    pub fn new(pool: Arc<Pool<MySql>>, product_name: impl Into<String>) -> Self {
        Self {
            pool,
            url: None,
            product_name: product_name.into(),
        }
    }

    pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Self> {
        let mut options = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let url = redact_url(database_url);
        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to create MySQL pool: {}", e)))?;

        let version: String = sqlx::query_scalar("select version()")
            .fetch_one(&pool)
            .await?;
        let product_name = product_from_version(&version);
        debug!("Connected to {} {} at {}", product_name, version, url);

        Ok(Self {
            pool: Arc::new(pool),
            url: Some(url),
            product_name: product_name.to_string(),
        })
    }

    pub fn inner(&self) -> &Pool<MySql> {
        &self.pool
    }
}

/// `10.11.6-MariaDB-1:10.11.6+maria~ubu2204` is MariaDB, anything else MySQL
fn product_from_version(version: &str) -> &'static str {
    if version.to_ascii_lowercase().contains("mariadb") {
        "MariaDB"
    } else {
        "MySQL"
    }
}

#[async_trait]
impl DatabasePool for MySqlPool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(MySqlTransaction { tx: Some(tx) }))
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn metadata(&self) -> ConnectionMetadata {
        let metadata = ConnectionMetadata::new()
            .product_name(self.product_name.clone())
            .driver_name("sqlx-mysql");
        match &self.url {
            Some(url) => metadata.url(url.clone()),
            None => metadata,
        }
    }
}

/// MySQL transaction.
///
/// MySQL commits DDL implicitly, so only the history bookkeeping is truly
/// transactional here; the row lock still serialises concurrent runs.
pub struct MySqlTransaction {
    tx: Option<sqlx::Transaction<'static, MySql>>,
}

impl MySqlTransaction {
    fn active(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, MySql>> {
        self.tx
            .as_mut()
            .ok_or_else(|| MigrateError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for MySqlTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let tx = self.active()?;
        let result = bind_all(sqlx::query(sql), params).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
        let tx = self.active()?;
        let rows = bind_all(sqlx::query(sql), params).fetch_all(&mut **tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrateResult<Option<DatabaseRow>> {
        let tx = self.active()?;
        let row = bind_all(sqlx::query(sql), params).fetch_optional(&mut **tx).await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn commit(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::Transaction("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::Transaction("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[DatabaseValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Bool(b) => query.bind(*b),
            DatabaseValue::Int32(i) => query.bind(*i),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::String(s) => query.bind(s.clone()),
            DatabaseValue::DateTime(dt) => query.bind(*dt),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> MigrateResult<DatabaseRow> {
    use sqlx::{Column, Row};

    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<MigrateResult<Vec<_>>>()?;

    Ok(DatabaseRow::new(columns, values))
}

fn decode_value(row: &MySqlRow, index: usize) -> MigrateResult<DatabaseValue> {
    use sqlx::{Column, Row, TypeInfo, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    let value = match type_name {
        "BOOLEAN" => DatabaseValue::Bool(row.try_get(index)?),
        "TINYINT" => DatabaseValue::Int32(row.try_get::<i8, _>(index)? as i32),
        "SMALLINT" => DatabaseValue::Int32(row.try_get::<i16, _>(index)? as i32),
        "INT" | "MEDIUMINT" => DatabaseValue::Int32(row.try_get(index)?),
        "BIGINT" => DatabaseValue::Int64(row.try_get(index)?),
        "TINYINT UNSIGNED" => DatabaseValue::Int32(row.try_get::<u8, _>(index)? as i32),
        "SMALLINT UNSIGNED" => DatabaseValue::Int32(row.try_get::<u16, _>(index)? as i32),
        "INT UNSIGNED" | "MEDIUMINT UNSIGNED" => {
            DatabaseValue::Int64(row.try_get::<u32, _>(index)? as i64)
        }
        "BIGINT UNSIGNED" => DatabaseValue::Int64(row.try_get::<u64, _>(index)? as i64),
        "TIMESTAMP" => DatabaseValue::DateTime(row.try_get(index)?),
        "DATETIME" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::DateTime(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
        }
        "VARBINARY" | "BINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            // information_schema hands back some names as binary strings
            let bytes: Vec<u8> = row.try_get(index)?;
            DatabaseValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => {
            let value: String = row.try_get(index).map_err(|e| {
                MigrateError::Catalog(format!(
                    "Cannot decode column '{}' of type {}: {}",
                    column.name(),
                    type_name,
                    e
                ))
            })?;
            DatabaseValue::String(value)
        }
    };

    Ok(value)
}
