//! Forward application of change sets and history queries

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use super::definitions::{ChangeSetHistory, ChangeSetStatus, MigrationRunResult};
use super::{abort, VersioningEngine};
use crate::backends::DatabaseTransaction;
use crate::change::ChangeSet;
use crate::engine::Direction;
use crate::error::MigrateResult;

impl VersioningEngine {
    /// Apply every change set that has no history row yet.
    ///
    /// The whole batch runs in one transaction; on failure it is rolled back
    /// and the original error returned.
    pub async fn forward(&self, change_sets: &[ChangeSet]) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut tx = self.pool.begin_transaction().await?;

        match self.forward_in(tx.as_mut(), change_sets).await {
            Ok(mut result) => {
                tx.commit().await?;
                result.execution_time_ms = start_time.elapsed().as_millis();
                info!(
                    "Applied {} change set(s), skipped {} in {}ms",
                    result.applied_count(),
                    result.skipped_count(),
                    result.execution_time_ms
                );
                Ok(result)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    async fn forward_in(
        &self,
        tx: &mut dyn DatabaseTransaction,
        change_sets: &[ChangeSet],
    ) -> MigrateResult<MigrationRunResult> {
        self.prepare(tx).await?;

        let history = self.history();
        let mut result = MigrationRunResult::default();

        for change_set in change_sets {
            if self.is_applied(tx, &change_set.change_set_id).await? {
                debug!("Change set {} already applied, skipping", change_set.change_set_id);
                result.skipped.push(change_set.change_set_id.clone());
                continue;
            }

            info!(
                "Applying change set: {} ({})",
                change_set.change_set_id, change_set.migration_class_name
            );
            self.execute_change_set(tx, change_set, Direction::Forward).await?;

            let (sql, params) = history.record_sql(
                &change_set.migration_class_name,
                &change_set.change_set_id,
                change_set.tag.as_deref(),
            );
            tx.execute(&sql, &params).await?;

            result.applied.push(change_set.change_set_id.clone());
        }

        Ok(result)
    }

    /// History rows in application order
    pub async fn applied_change_sets(&self) -> MigrateResult<Vec<ChangeSetHistory>> {
        let mut tx = self.pool.begin_transaction().await?;

        let rows = match self.read_history(tx.as_mut()).await {
            Ok(rows) => rows,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;
        Ok(rows)
    }

    async fn read_history(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<Vec<ChangeSetHistory>> {
        self.prepare(tx).await?;
        let rows = tx.fetch_all(&self.history().list_sql(), &[]).await?;
        rows.iter().map(ChangeSetHistory::from_row).collect()
    }

    /// Applied/pending state of each given change set
    pub async fn status(&self, change_sets: &[ChangeSet]) -> MigrateResult<Vec<(String, ChangeSetStatus)>> {
        let applied: HashMap<String, ChangeSetHistory> = self
            .applied_change_sets()
            .await?
            .into_iter()
            .map(|row| (row.change_set_id.clone(), row))
            .collect();

        Ok(change_sets
            .iter()
            .map(|change_set| {
                let status = match applied.get(&change_set.change_set_id) {
                    Some(row) => ChangeSetStatus::Applied {
                        applied_at: row.applied_at,
                    },
                    None => ChangeSetStatus::Pending,
                };
                (change_set.change_set_id.clone(), status)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::change::{AddColumn, Column, CreateSequence, CreateTable};
    use crate::config::MigrationConfig;
    use crate::ddl::{MySqlDdlGenerator, PostgresDdlGenerator};
    use crate::engine::MigrateEngine;
    use crate::error::MigrateError;
    use crate::versioning::testing::RecordingPool;

    fn engine(pool: &RecordingPool) -> VersioningEngine {
        VersioningEngine::new(
            Arc::new(pool.clone()),
            MigrateEngine::new(Arc::new(PostgresDdlGenerator::new())),
            MigrationConfig::new(),
        )
    }

    fn users() -> ChangeSet {
        ChangeSet::builder("V1__users", "users-1")
            .tag("v1")
            .change(CreateTable::new("users", vec![Column::new("id", "bigint").primary_key()]))
            .change(AddColumn::new("users", Column::new("email", "text")))
            .build()
    }

    #[tokio::test]
    async fn test_forward_applies_and_records_history() {
        let pool = RecordingPool::new();
        let result = engine(&pool).forward(&[users()]).await.unwrap();

        assert_eq!(result.applied, vec!["users-1".to_string()]);
        assert!(result.skipped.is_empty());
        assert_eq!(pool.applied_ids(), vec!["users-1".to_string()]);

        let executed = pool.executed();
        assert!(executed[0].starts_with("create table if not exists change_set_history"));
        assert_eq!(executed[1], "select id from change_set_history for update");
        assert_eq!(executed[2], "create table users (\nid bigint primary key\n)");
        assert_eq!(executed[3], "alter table users add column email text");
        assert!(executed[4].starts_with("insert into change_set_history"));

        let state = pool.state.lock().unwrap();
        assert_eq!(state.history[0].3.as_deref(), Some("v1"));
        assert_eq!(state.commits, 1);
    }

    #[tokio::test]
    async fn test_second_forward_is_a_no_op() {
        let pool = RecordingPool::new();
        let engine = engine(&pool);

        engine.forward(&[users()]).await.unwrap();
        let before = pool.executed().len();

        let result = engine.forward(&[users()]).await.unwrap();
        assert!(result.applied.is_empty());
        assert_eq!(result.skipped, vec!["users-1".to_string()]);
        // only the bootstrap and the lock run again
        assert_eq!(pool.executed().len(), before + 2);
        assert_eq!(pool.applied_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_statement_rolls_back_whole_batch() {
        let pool = RecordingPool::failing_on("add column email");
        let accounts = ChangeSet::builder("V0__accounts", "accounts-1")
            .change(CreateTable::new("accounts", vec![Column::new("id", "bigint")]))
            .build();

        let err = engine(&pool).forward(&[accounts, users()]).await.unwrap_err();

        match err {
            MigrateError::Execution {
                change_set_id,
                statement,
                ..
            } => {
                assert_eq!(change_set_id, "users-1");
                assert_eq!(statement, "alter table users add column email text");
            }
            other => panic!("Expected Execution error, got {:?}", other),
        }

        let state = pool.state.lock().unwrap();
        assert!(state.history.is_empty());
        assert!(state.executed.is_empty());
        assert_eq!(state.rollbacks, 1);
        assert_eq!(state.commits, 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_original_error() {
        let pool = RecordingPool {
            fail_rollback: true,
            ..RecordingPool::failing_on("create table users")
        };

        let err = engine(&pool).forward(&[users()]).await.unwrap_err();
        assert!(matches!(err, MigrateError::RollbackFailed { .. }));
        assert!(matches!(err.root(), MigrateError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_change_runs_no_ddl() {
        let pool = RecordingPool::new();
        let engine = VersioningEngine::new(
            Arc::new(pool.clone()),
            MigrateEngine::new(Arc::new(MySqlDdlGenerator::mysql())),
            MigrationConfig::new(),
        );
        let change_set = ChangeSet::builder("V1", "seq-1")
            .change(CreateTable::new("t", vec![Column::new("id", "int")]))
            .change(CreateSequence::new("t_seq"))
            .build();

        let err = engine.forward(&[change_set]).await.unwrap_err();
        assert!(matches!(err, MigrateError::Unsupported { .. }));
        assert_eq!(pool.state.lock().unwrap().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_status_and_applied_change_sets() {
        let pool = RecordingPool::new();
        let engine = engine(&pool);
        engine.forward(&[users()]).await.unwrap();

        let pending = ChangeSet::new("V2", "orders-1", Vec::new());
        let status = engine.status(&[users(), pending]).await.unwrap();
        assert!(status[0].1.is_applied());
        assert_eq!(status[1], ("orders-1".to_string(), ChangeSetStatus::Pending));

        let applied = engine.applied_change_sets().await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].migration_class, "V1__users");
        assert_eq!(applied[0].tag.as_deref(), Some("v1"));
    }
}
