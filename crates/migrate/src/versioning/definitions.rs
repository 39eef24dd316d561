//! Versioning Definitions - history rows and run results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backends::DatabaseRow;
use crate::error::MigrateResult;

/// A row of the change set history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetHistory {
    pub id: i64,
    pub migration_class: String,
    pub change_set_id: String,
    pub tag: Option<String>,
    pub applied_at: DateTime<Utc>,
}

impl ChangeSetHistory {
    pub(crate) fn from_row(row: &DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            migration_class: row.get_string("migration_class")?,
            change_set_id: row.get_string("change_set_id")?,
            tag: row.get_optional_string("tag")?,
            applied_at: row.get_datetime("applied_at")?,
        })
    }
}

/// Result of a forward run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationRunResult {
    /// Change sets applied by this run, in order
    pub applied: Vec<String>,
    /// Change sets that already had a history row
    pub skipped: Vec<String>,
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of a rollback run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackResult {
    /// Change sets reverted by this run, in the order they were reverted
    pub rolled_back: Vec<String>,
    /// Change sets that were never applied
    pub skipped: Vec<String>,
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }
}

/// Whether a change set has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChangeSetStatus {
    Pending,
    Applied { applied_at: DateTime<Utc> },
}

impl ChangeSetStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, ChangeSetStatus::Applied { .. })
    }
}
