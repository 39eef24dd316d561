//! PostgreSQL Backend Implementation
//!
//! Implements the backend traits on top of sqlx's PostgreSQL driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres};
use tracing::debug;

use super::core::*;
use super::redact_url;
use crate::error::{MigrateError, MigrateResult};

/// PostgreSQL connection pool
pub struct PostgresPool {
    pool: Arc<Pool<Postgres>>,
    url: Option<String>,
}

impl PostgresPool {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool, url: None }
    }

    /// Connect with the given pool settings
    pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Self> {
        let mut options = PgPoolOptions::new()
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
        debug!("Connecting to PostgreSQL at {}", url);

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
            url: Some(url),
        })
    }

    pub fn inner(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
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
            .product_name("PostgreSQL")
            .driver_name("sqlx-postgres");
        match &self.url {
            Some(url) => metadata.url(url.clone()),
            None => metadata,
        }
    }
}

/// PostgreSQL transaction
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn active(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| MigrateError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
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
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
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

fn decode_row(row: &PgRow) -> MigrateResult<DatabaseRow> {
    use sqlx::{Column, Row};

    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<MigrateResult<Vec<_>>>()?;

    Ok(DatabaseRow::new(columns, values))
}

fn decode_value(row: &PgRow, index: usize) -> MigrateResult<DatabaseValue> {
    use sqlx::{Column, Row, TypeInfo, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let column = &row.columns()[index];
    let value = match column.type_info().name() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Int32(row.try_get::<i16, _>(index)? as i32),
        "INT4" => DatabaseValue::Int32(row.try_get(index)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index)?),
        "\"CHAR\"" => {
            let code: i8 = row.try_get(index)?;
            DatabaseValue::String((code as u8 as char).to_string())
        }
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::DateTime(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
        }
        type_name => {
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
