//! SQL for the change set history table.
//!
//! The table itself is declared as a `CreateTable` change and rendered by
//! the active dialect, so it gets the same identity and type handling as
//! user tables.

use crate::backends::DatabaseValue;
use crate::change::{Column, CreateTable};
use crate::config::MigrationConfig;
use crate::ddl::DdlGenerator;
use crate::error::MigrateResult;

pub(crate) struct HistoryTable<'a> {
    generator: &'a dyn DdlGenerator,
    table: String,
}

impl<'a> HistoryTable<'a> {
    pub fn new(generator: &'a dyn DdlGenerator, config: &MigrationConfig) -> Self {
        let table = match &config.schema {
            Some(schema) => format!("{}.{}", schema, config.history_table),
            None => config.history_table.clone(),
        };
        Self { generator, table }
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn definition(&self) -> CreateTable {
        let types = self.generator.history_column_types();
        CreateTable::new(
            self.table.clone(),
            vec![
                Column::new("id", types.id).auto_increment().primary_key(),
                Column::new("migration_class", types.text).not_null(),
                Column::new("change_set_id", types.text).not_null().unique(),
                Column::new("tag", types.text),
                Column::new("applied_at", types.timestamp)
                    .default_value("current_timestamp")
                    .not_null(),
            ],
        )
        .if_not_exists()
    }

    pub fn create_sql(&self) -> MigrateResult<String> {
        self.generator.create_table(&self.definition())
    }

    pub fn lock_sql(&self) -> String {
        self.generator.lock_rows_sql(&self.table)
    }

    pub fn check_sql(&self, change_set_id: &str) -> (String, Vec<DatabaseValue>) {
        (
            format!(
                "select change_set_id from {} where change_set_id = {}",
                self.table,
                self.generator.placeholder(1)
            ),
            vec![change_set_id.into()],
        )
    }

    pub fn record_sql(
        &self,
        migration_class: &str,
        change_set_id: &str,
        tag: Option<&str>,
    ) -> (String, Vec<DatabaseValue>) {
        (
            format!(
                "insert into {} (migration_class, change_set_id, tag) values ({}, {}, {})",
                self.table,
                self.generator.placeholder(1),
                self.generator.placeholder(2),
                self.generator.placeholder(3)
            ),
            vec![migration_class.into(), change_set_id.into(), tag.into()],
        )
    }

    pub fn remove_sql(&self, change_set_id: &str) -> (String, Vec<DatabaseValue>) {
        (
            format!(
                "delete from {} where change_set_id = {}",
                self.table,
                self.generator.placeholder(1)
            ),
            vec![change_set_id.into()],
        )
    }

    pub fn list_sql(&self) -> String {
        format!(
            "select id, migration_class, change_set_id, tag, applied_at from {} order by id",
            self.table
        )
    }
}
