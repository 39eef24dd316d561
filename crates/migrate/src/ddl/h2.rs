//! H2 DDL generator

use super::*;

#[derive(Debug, Default, Clone)]
pub struct H2DdlGenerator;

impl H2DdlGenerator {
    pub fn new() -> Self {
        Self
    }

    fn column_definition(&self, column: &Column) -> String {
        if column.auto_increment {
            return format!(
                "{} {}{}{}",
                column.name,
                column.data_type,
                identity_clause(column),
                constraint_clause(&column.constraint)
            );
        }

        format!(
            "{} {}{}{}",
            column.name,
            column.data_type,
            default_clause(column),
            constraint_clause(&column.constraint)
        )
    }
}

impl DdlGenerator for H2DdlGenerator {
    fn dialect_name(&self) -> &'static str {
        "h2"
    }

    fn display_name(&self) -> &'static str {
        "H2"
    }

    fn create_table(&self, change: &CreateTable) -> MigrateResult<String> {
        let columns = change
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        normalized(create_table_statement(change, columns))
    }

    fn add_column(&self, change: &AddColumn) -> MigrateResult<String> {
        let position = match (&change.after_column, &change.before_column) {
            (Some(_), Some(_)) => return Err(both_positions_error(self, change)),
            (Some(after), None) => format!(" after {}", after),
            (None, Some(before)) => format!(" before {}", before),
            (None, None) => String::new(),
        };
        normalized(format!(
            "alter table {} add column {}{}",
            change.table_name,
            self.column_definition(&change.column),
            position
        ))
    }

    fn rename_table(&self, change: &RenameTable) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} rename to {}",
            change.old_name, change.new_name
        ))
    }

    fn rename_column(&self, change: &RenameColumn) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} rename to {}",
            change.table_name, change.old_name, change.new_name
        ))
    }

    fn add_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String> {
        if change.deferrable || change.initially_deferred {
            return Err(deferrable_unsupported(self, change));
        }
        normalized(foreign_key_statement(change))
    }

    fn add_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(create_index_statement(change))
    }

    fn modify_data_type(&self, change: &ModifyDataType) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} set data type {}",
            change.table_name, change.column_name, change.new_type
        ))
    }

    /// H2 takes one ALTER COLUMN action per statement
    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        let not_null = format!(
            "alter table {} alter column {} set not null",
            change.table_name, change.column_name
        );
        match &change.default_value {
            Some(default) => statement_group(&[
                format!(
                    "alter table {} alter column {} set default {}",
                    change.table_name, change.column_name, default
                ),
                not_null,
            ]),
            None => normalized(not_null),
        }
    }

    fn add_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String> {
        normalized(add_unique_statement(change))
    }

    fn create_sequence(&self, change: &CreateSequence) -> MigrateResult<String> {
        normalized(create_sequence_statement(change, true))
    }

    fn drop_table(&self, change: &CreateTable) -> MigrateResult<String> {
        normalized(format!("drop table {}", change.table_name))
    }

    fn drop_column(&self, change: &AddColumn) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} drop column {}",
            change.table_name, change.column.name
        ))
    }

    fn drop_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} drop constraint {}",
            change.table_name, change.constraint_name
        ))
    }

    fn drop_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(format!("drop index {}", change.index_name))
    }

    fn drop_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} set null",
            change.table_name, change.column_name
        ))
    }

    fn drop_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} drop constraint {}",
            change.table_name, change.constraint_name
        ))
    }

    fn drop_sequence(&self, change: &CreateSequence) -> MigrateResult<String> {
        normalized(format!("drop sequence {}", change.name))
    }
}
