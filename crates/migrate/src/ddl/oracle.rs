//! Oracle DDL generator

use super::*;
use crate::change::ForeignKeyAction;

#[derive(Debug, Default, Clone)]
pub struct OracleDdlGenerator;

impl OracleDdlGenerator {
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

impl DdlGenerator for OracleDdlGenerator {
    fn dialect_name(&self) -> &'static str {
        "oracle"
    }

    fn display_name(&self) -> &'static str {
        "Oracle"
    }

    fn create_table(&self, change: &CreateTable) -> MigrateResult<String> {
        let columns = change
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        let create = create_table_statement(&CreateTable { if_not_exists: false, ..change.clone() }, columns);

        if change.if_not_exists {
            // ORA-00955: name is already used by an existing object
            normalized(format!(
                "begin execute immediate '{}'; exception when others then if sqlcode != -955 then raise; end if; end;",
                create.replace('\'', "''")
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
            "alter table {} add ({})",
            change.table_name,
            self.column_definition(&change.column)
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
            "alter table {} rename column {} to {}",
            change.table_name, change.old_name, change.new_name
        ))
    }

    /// Oracle has no ON UPDATE and only CASCADE / SET NULL for ON DELETE;
    /// NO ACTION and RESTRICT are its implicit behaviour and are left out.
    fn add_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String> {
        if change.on_update.is_some() {
            return Err(MigrateError::unsupported(
                self.dialect_name(),
                format!(
                    "Oracle does not support ON UPDATE actions for foreign keys ({})",
                    change.constraint_name
                ),
            ));
        }
        let on_delete = match change.on_delete {
            Some(ForeignKeyAction::SetDefault) => {
                return Err(MigrateError::unsupported(
                    self.dialect_name(),
                    format!(
                        "Oracle does not support ON DELETE SET DEFAULT ({})",
                        change.constraint_name
                    ),
                ))
            }
            Some(ForeignKeyAction::NoAction) | Some(ForeignKeyAction::Restrict) => None,
            other => other,
        };

        normalized(foreign_key_statement(&AddForeignKey {
            on_delete,
            ..change.clone()
        }))
    }

    fn add_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(create_index_statement(change))
    }

    fn modify_data_type(&self, change: &ModifyDataType) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} modify ({} {})",
            change.table_name, change.column_name, change.new_type
        ))
    }

    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        let default = change
            .default_value
            .as_ref()
            .map(|value| format!(" default {}", value))
            .unwrap_or_default();
        normalized(format!(
            "alter table {} modify ({}{} not null)",
            change.table_name, change.column_name, default
        ))
    }

    fn add_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String> {
        normalized(add_unique_statement(change))
    }

    fn create_sequence(&self, change: &CreateSequence) -> MigrateResult<String> {
        normalized(create_sequence_statement(change, false))
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
            "alter table {} modify ({} null)",
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

    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }

    fn history_column_types(&self) -> HistoryColumnTypes {
        HistoryColumnTypes {
            id: "number(19)",
            text: "varchar2(255)",
            timestamp: "timestamp",
        }
    }
}
