//! Migrate Engine
//!
//! Maps each `Change` to the active dialect's forward or rollback DDL.

use std::sync::Arc;

use serde::Serialize;

use crate::change::{Change, ChangeSet};
use crate::ddl::{self, DdlGenerator};
use crate::error::MigrateResult;

/// Which way a batch of change sets is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Rollback,
}

/// DDL a change set would execute, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlPreview {
    pub change_set_id: String,
    pub statements: Vec<String>,
}

/// Dispatches changes to a dialect's DDL generator
#[derive(Debug, Clone)]
pub struct MigrateEngine {
    generator: Arc<dyn DdlGenerator>,
}

impl MigrateEngine {
    pub fn new(generator: Arc<dyn DdlGenerator>) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &dyn DdlGenerator {
        self.generator.as_ref()
    }

    pub fn dialect_name(&self) -> &'static str {
        self.generator.dialect_name()
    }

    pub fn forward_ddl(&self, change: &Change) -> MigrateResult<String> {
        let g = self.generator.as_ref();
        match change {
            Change::CreateTable(c) => g.create_table(c),
            Change::AddColumn(c) => g.add_column(c),
            Change::RenameTable(c) => g.rename_table(c),
            Change::RenameColumn(c) => g.rename_column(c),
            Change::AddForeignKey(c) => g.add_foreign_key(c),
            Change::AddIndex(c) => g.add_index(c),
            Change::ModifyDataType(c) => g.modify_data_type(c),
            Change::AddNotNullConstraint(c) => g.add_not_null_constraint(c),
            Change::AddUniqueConstraint(c) => g.add_unique_constraint(c),
            Change::CreateSequence(c) => g.create_sequence(c),
        }
    }

    pub fn rollback_ddl(&self, change: &Change) -> MigrateResult<String> {
        let g = self.generator.as_ref();
        match change {
            Change::CreateTable(c) => g.drop_table(c),
            Change::AddColumn(c) => g.drop_column(c),
            Change::RenameTable(c) => ddl::reverse_rename_table(g, c),
            Change::RenameColumn(c) => ddl::reverse_rename_column(g, c),
            Change::AddForeignKey(c) => g.drop_foreign_key(c),
            Change::AddIndex(c) => g.drop_index(c),
            Change::ModifyDataType(c) => ddl::reverse_modify_data_type(g, c),
            Change::AddNotNullConstraint(c) => g.drop_not_null_constraint(c),
            Change::AddUniqueConstraint(c) => g.drop_unique_constraint(c),
            Change::CreateSequence(c) => g.drop_sequence(c),
        }
    }

    /// Executable statements for one change in the given direction
    pub fn statements(&self, change: &Change, direction: Direction) -> MigrateResult<Vec<String>> {
        let ddl = match direction {
            Direction::Forward => self.forward_ddl(change)?,
            Direction::Rollback => self.rollback_ddl(change)?,
        };
        Ok(ddl::split_statements(&ddl))
    }

    /// Render a batch without touching a database.
    ///
    /// Rollback visits change sets last-to-first but keeps each change set's
    /// own change order, matching what `VersioningEngine::rollback` runs.
    pub fn preview(&self, change_sets: &[ChangeSet], direction: Direction) -> MigrateResult<Vec<DdlPreview>> {
        let ordered: Vec<&ChangeSet> = match direction {
            Direction::Forward => change_sets.iter().collect(),
            Direction::Rollback => change_sets.iter().rev().collect(),
        };

        ordered
            .into_iter()
            .map(|change_set| {
                let mut statements = Vec::new();
                for change in &change_set.changes {
                    statements.extend(self.statements(change, direction)?);
                }
                Ok(DdlPreview {
                    change_set_id: change_set.change_set_id.clone(),
                    statements,
                })
            })
            .collect()
    }
}
