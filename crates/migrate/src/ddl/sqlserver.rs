//! SQL Server DDL generator

use super::*;
use crate::change::ForeignKeyAction;

#[derive(Debug, Default, Clone)]
pub struct SqlServerDdlGenerator;

impl SqlServerDdlGenerator {
    pub fn new() -> Self {
        Self
    }

    fn column_definition(&self, column: &Column) -> String {
        if column.auto_increment {
            let (start, increment) = column
                .identity
                .as_ref()
                .map(|identity| (identity.start.unwrap_or(1), identity.increment_by.unwrap_or(1)))
                .unwrap_or((1, 1));
            let nullability = if column.constraint.primary_key { "" } else { " not null" };
            return format!(
                "{} {} identity({}, {}){}{}",
                column.name,
                column.data_type,
                start,
                increment,
                nullability,
                constraint_clause(&ColumnConstraint {
                    nullable: true,
                    ..column.constraint
                })
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

    /// SQL Server spells RESTRICT as NO ACTION
    fn referential_action(action: ForeignKeyAction) -> ForeignKeyAction {
        match action {
            ForeignKeyAction::Restrict => ForeignKeyAction::NoAction,
            other => other,
        }
    }
}

impl DdlGenerator for SqlServerDdlGenerator {
    fn dialect_name(&self) -> &'static str {
        "sqlserver"
    }

    fn display_name(&self) -> &'static str {
        "SQL Server"
    }

    fn create_table(&self, change: &CreateTable) -> MigrateResult<String> {
        let columns: Vec<String> = change
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        let create = format!("create table {} (\n{}\n)", change.table_name, columns.join(",\n"));

        if change.if_not_exists {
            normalized(format!(
                "if object_id('{}', 'U') is null\n{}",
                change.table_name, create
            ))
        } else {
            normalized(create)
        }
    }

    fn add_column(&self, change: &AddColumn) -> MigrateResult<String> {
        if change.is_positional() {
            return Err(positional_unsupported(self));
        }
        normalized(format!(
            "alter table {} add {}",
            change.table_name,
            self.column_definition(&change.column)
        ))
    }

    fn rename_table(&self, change: &RenameTable) -> MigrateResult<String> {
        normalized(format!(
            "exec sp_rename '{}', '{}'",
            change.old_name, change.new_name
        ))
    }

    fn rename_column(&self, change: &RenameColumn) -> MigrateResult<String> {
        normalized(format!(
            "exec sp_rename '{}.{}', '{}', 'COLUMN'",
            change.table_name, change.old_name, change.new_name
        ))
    }

    fn add_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String> {
        if change.deferrable || change.initially_deferred {
            return Err(deferrable_unsupported(self, change));
        }
        let change = AddForeignKey {
            on_delete: change.on_delete.map(Self::referential_action),
            on_update: change.on_update.map(Self::referential_action),
            ..change.clone()
        };
        normalized(foreign_key_statement(&change))
    }

    fn add_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(create_index_statement(change))
    }

    fn modify_data_type(&self, change: &ModifyDataType) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} {}",
            change.table_name, change.column_name, change.new_type
        ))
    }

    /// Defaults are constraints in SQL Server, so this is a two-statement group
    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        let not_null = format!(
            "alter table {} alter column {} {} not null",
            change.table_name, change.column_name, change.column_type
        );
        match &change.default_value {
            Some(default) => statement_group(&[
                format!(
                    "alter table {table} add constraint df_{table}_{column} default {default} for {column}",
                    table = change.table_name,
                    column = change.column_name,
                    default = default
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
        normalized(format!("drop index {} on {}", change.index_name, change.table_name))
    }

    fn drop_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} {} null",
            change.table_name, change.column_name, change.column_type
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

    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    fn lock_rows_sql(&self, table: &str) -> String {
        format!("select id from {} with (updlock, holdlock)", table)
    }

    fn history_column_types(&self) -> HistoryColumnTypes {
        HistoryColumnTypes {
            id: "bigint",
            text: "nvarchar(255)",
            timestamp: "datetime2",
        }
    }
}
