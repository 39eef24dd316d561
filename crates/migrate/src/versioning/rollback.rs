//! Rollback of applied change sets

use std::time::Instant;

use tracing::{debug, info};

use super::definitions::RollbackResult;
use super::{abort, VersioningEngine};
use crate::backends::DatabaseTransaction;
use crate::change::ChangeSet;
use crate::engine::Direction;
use crate::error::MigrateResult;

impl VersioningEngine {
    /// Revert the given change sets, last first.
    ///
    /// Only change sets with a history row are touched. Within one change set
    /// the rollback statements keep the order the changes were declared in.
    pub async fn rollback(&self, change_sets: &[ChangeSet]) -> MigrateResult<RollbackResult> {
        let start_time = Instant::now();
        let mut tx = self.pool.begin_transaction().await?;

        match self.rollback_in(tx.as_mut(), change_sets).await {
            Ok(mut result) => {
                tx.commit().await?;
                result.execution_time_ms = start_time.elapsed().as_millis();
                info!(
                    "Rolled back {} change set(s) in {}ms",
                    result.rolled_back_count(),
                    result.execution_time_ms
                );
                Ok(result)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    async fn rollback_in(
        &self,
        tx: &mut dyn DatabaseTransaction,
        change_sets: &[ChangeSet],
    ) -> MigrateResult<RollbackResult> {
        self.prepare(tx).await?;

        let history = self.history();
        let mut result = RollbackResult::default();

        for change_set in change_sets.iter().rev() {
            if !self.is_applied(tx, &change_set.change_set_id).await? {
                debug!("Change set {} not applied, nothing to roll back", change_set.change_set_id);
                result.skipped.push(change_set.change_set_id.clone());
                continue;
            }

            info!(
                "Rolling back change set: {} ({})",
                change_set.change_set_id, change_set.migration_class_name
            );
            self.execute_change_set(tx, change_set, Direction::Rollback).await?;

            let (sql, params) = history.remove_sql(&change_set.change_set_id);
            tx.execute(&sql, &params).await?;

            result.rolled_back.push(change_set.change_set_id.clone());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::change::{Column, CreateTable, ModifyDataType, RenameTable};
    use crate::config::MigrationConfig;
    use crate::ddl::PostgresDdlGenerator;
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

    fn batch() -> Vec<ChangeSet> {
        vec![
            ChangeSet::builder("V1", "cs-1")
                .change(CreateTable::new("a", vec![Column::new("id", "int")]))
                .build(),
            ChangeSet::builder("V2", "cs-2")
                .change(RenameTable::new("a", "b"))
                .build(),
        ]
    }

    #[tokio::test]
    async fn test_rollback_reverses_change_set_order_and_clears_history() {
        let pool = RecordingPool::new();
        let engine = engine(&pool);
        engine.forward(&batch()).await.unwrap();
        let applied_statements = pool.executed().len();

        let result = engine.rollback(&batch()).await.unwrap();
        assert_eq!(result.rolled_back, vec!["cs-2".to_string(), "cs-1".to_string()]);
        assert!(pool.applied_ids().is_empty());

        let executed = pool.executed();
        let rollback: Vec<&String> = executed[applied_statements..]
            .iter()
            .filter(|s| s.starts_with("alter") || s.starts_with("drop"))
            .collect();
        assert_eq!(rollback, vec!["alter table b rename to a", "drop table a"]);
    }

    #[tokio::test]
    async fn test_rollback_of_unapplied_change_set_is_skipped() {
        let pool = RecordingPool::new();
        let result = engine(&pool).rollback(&batch()).await.unwrap();

        assert!(result.rolled_back.is_empty());
        assert_eq!(result.skipped, vec!["cs-2".to_string(), "cs-1".to_string()]);
        assert!(!pool
            .executed()
            .iter()
            .any(|s| s.starts_with("drop") || s.starts_with("delete")));
    }

    #[tokio::test]
    async fn test_rollback_without_old_type_fails_and_keeps_history() {
        let pool = RecordingPool::new();
        let engine = engine(&pool);
        let change_sets = vec![ChangeSet::builder("V3", "cs-3")
            .change(ModifyDataType::new("a", "id", "bigint"))
            .build()];
        engine.forward(&change_sets).await.unwrap();

        let err = engine.rollback(&change_sets).await.unwrap_err();
        assert!(matches!(err, MigrateError::MissingRollbackType { .. }));
        assert_eq!(pool.applied_ids(), vec!["cs-3".to_string()]);
    }
}
