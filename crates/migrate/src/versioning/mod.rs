//! Versioning Engine
//!
//! Applies and reverts ordered change sets inside one transaction per batch.
//! The history table records what has been applied; its rows are locked for
//! the duration of the batch so concurrent runners serialise on the database.

pub mod definitions;
mod history;
pub mod rollback;
pub mod runner;

use std::sync::Arc;

use tracing::error;

use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::change::ChangeSet;
use crate::config::MigrationConfig;
use crate::engine::{Direction, MigrateEngine};
use crate::error::{MigrateError, MigrateResult};

pub use definitions::{ChangeSetHistory, ChangeSetStatus, MigrationRunResult, RollbackResult};
use history::HistoryTable;

/// Transactional runner for change sets
pub struct VersioningEngine {
    pool: Arc<dyn DatabasePool>,
    engine: MigrateEngine,
    config: MigrationConfig,
}

impl VersioningEngine {
    pub fn new(pool: Arc<dyn DatabasePool>, engine: MigrateEngine, config: MigrationConfig) -> Self {
        Self { pool, engine, config }
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub fn engine(&self) -> &MigrateEngine {
        &self.engine
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub(crate) fn history(&self) -> HistoryTable<'_> {
        HistoryTable::new(self.engine.generator(), &self.config)
    }

    /// Create the history table if needed and lock its rows
    pub(crate) async fn prepare(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
        let history = self.history();
        for statement in crate::ddl::split_statements(&history.create_sql()?) {
            tx.execute(&statement, &[]).await?;
        }
        tx.fetch_all(&history.lock_sql(), &[]).await?;
        Ok(())
    }

    pub(crate) async fn is_applied(
        &self,
        tx: &mut dyn DatabaseTransaction,
        change_set_id: &str,
    ) -> MigrateResult<bool> {
        let (sql, params) = self.history().check_sql(change_set_id);
        Ok(tx.fetch_optional(&sql, &params).await?.is_some())
    }

    /// Run every statement of a change set in the given direction
    pub(crate) async fn execute_change_set(
        &self,
        tx: &mut dyn DatabaseTransaction,
        change_set: &ChangeSet,
        direction: Direction,
    ) -> MigrateResult<()> {
        // Render everything first so an unsupported change fails before any DDL runs
        let mut statements = Vec::new();
        for change in &change_set.changes {
            statements.extend(self.engine.statements(change, direction)?);
        }

        for statement in statements {
            tracing::debug!("{}: {}", change_set.change_set_id, statement);
            tx.execute(&statement, &[])
                .await
                .map_err(|e| MigrateError::execution(&change_set.change_set_id, &statement, e))?;
        }
        Ok(())
    }
}

/// Roll the transaction back after `err`, keeping `err` as the reported cause
pub(crate) async fn abort(tx: Box<dyn DatabaseTransaction>, err: MigrateError) -> MigrateError {
    match tx.rollback().await {
        Ok(()) => err,
        Err(rollback_err) => {
            error!("Rollback after failed migration also failed: {}", rollback_err);
            MigrateError::RollbackFailed {
                original: Box::new(err),
                rollback: Box::new(rollback_err),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory pool that records statements and keeps history rows

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::backends::*;
    use crate::error::{MigrateError, MigrateResult};

    #[derive(Debug, Default)]
    pub struct State {
        /// Committed statements
        pub executed: Vec<String>,
        /// Committed history rows: (id, migration_class, change_set_id, tag)
        pub history: Vec<(i64, String, String, Option<String>)>,
        pub commits: usize,
        pub rollbacks: usize,
    }

    #[derive(Clone, Default)]
    pub struct RecordingPool {
        pub state: Arc<Mutex<State>>,
        /// Statements containing this text fail
        pub fail_on: Option<String>,
        pub fail_rollback: bool,
    }

    impl RecordingPool {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(text: &str) -> Self {
            Self {
                fail_on: Some(text.to_string()),
                ..Self::default()
            }
        }

        pub fn executed(&self) -> Vec<String> {
            self.state.lock().unwrap().executed.clone()
        }

        pub fn applied_ids(&self) -> Vec<String> {
            self.state
                .lock()
                .unwrap()
                .history
                .iter()
                .map(|(_, _, id, _)| id.clone())
                .collect()
        }
    }

    struct RecordingTransaction {
        pool: RecordingPool,
        executed: Vec<String>,
        history: Vec<(i64, String, String, Option<String>)>,
    }

    fn text(value: &DatabaseValue) -> String {
        value.as_str().unwrap_or_default().to_string()
    }

    fn history_row(entry: &(i64, String, String, Option<String>)) -> DatabaseRow {
        DatabaseRow::from_pairs([
            ("id", DatabaseValue::Int64(entry.0)),
            ("migration_class", entry.1.clone().into()),
            ("change_set_id", entry.2.clone().into()),
            ("tag", entry.3.clone().into()),
            ("applied_at", Utc::now().into()),
        ])
    }

    #[async_trait]
    impl DatabaseTransaction for RecordingTransaction {
        async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
            if let Some(fail_on) = &self.pool.fail_on {
                if sql.contains(fail_on.as_str()) {
                    return Err(MigrateError::Database(format!("syntax error near '{}'", fail_on)));
                }
            }
            self.executed.push(sql.to_string());

            if sql.starts_with("insert into") {
                let id = self.history.iter().map(|h| h.0).max().unwrap_or(0) + 1;
                let tag = params[2].as_str().map(str::to_string);
                self.history.push((id, text(&params[0]), text(&params[1]), tag));
            } else if sql.starts_with("delete from") {
                let id = text(&params[0]);
                self.history.retain(|h| h.2 != id);
            }
            Ok(1)
        }

        async fn fetch_all(&mut self, sql: &str, _params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
            self.executed.push(sql.to_string());
            if sql.contains("order by id") {
                return Ok(self.history.iter().map(history_row).collect());
            }
            Ok(Vec::new())
        }

        async fn fetch_optional(
            &mut self,
            _sql: &str,
            params: &[DatabaseValue],
        ) -> MigrateResult<Option<DatabaseRow>> {
            let id = text(&params[0]);
            Ok(self
                .history
                .iter()
                .find(|h| h.2 == id)
                .map(|h| DatabaseRow::from_pairs([("change_set_id", h.2.clone())])))
        }

        async fn commit(self: Box<Self>) -> MigrateResult<()> {
            let this = *self;
            let mut state = this.pool.state.lock().unwrap();
            state.executed.extend(this.executed);
            state.history = this.history;
            state.commits += 1;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> MigrateResult<()> {
            let this = *self;
            let mut state = this.pool.state.lock().unwrap();
            state.rollbacks += 1;
            if this.pool.fail_rollback {
                return Err(MigrateError::Transaction("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DatabasePool for RecordingPool {
        async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
            let history = self.state.lock().unwrap().history.clone();
            Ok(Box::new(RecordingTransaction {
                pool: self.clone(),
                executed: Vec::new(),
                history,
            }))
        }

        async fn fetch_all(&self, _sql: &str, _params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
            Ok(Vec::new())
        }

        async fn close(&self) {}

        fn metadata(&self) -> ConnectionMetadata {
            ConnectionMetadata::new().driver_name("recording")
        }
    }
}
