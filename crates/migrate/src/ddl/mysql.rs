//! MySQL and MariaDB DDL generator
//!
//! Both share one renderer; they differ only in sequence support, which
//! MariaDB has and MySQL lacks.

use tracing::warn;

use super::*;
use crate::change::IndividualObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySqlFlavor {
    MySql,
    MariaDb,
}

#[derive(Debug, Clone)]
pub struct MySqlDdlGenerator {
    flavor: MySqlFlavor,
}

impl MySqlDdlGenerator {
    pub fn new(flavor: MySqlFlavor) -> Self {
        Self { flavor }
    }

    pub fn mysql() -> Self {
        Self::new(MySqlFlavor::MySql)
    }

    pub fn mariadb() -> Self {
        Self::new(MySqlFlavor::MariaDb)
    }

    pub fn flavor(&self) -> MySqlFlavor {
        self.flavor
    }

    fn column_definition(&self, column: &Column) -> String {
        if column.auto_increment {
            // auto_increment columns are never nullable and take no default
            let mut definition = format!("{} {}", column.name, column.data_type);
            if !column.constraint.primary_key {
                definition.push_str(" not null");
            }
            definition.push_str(" auto_increment");
            if column.constraint.primary_key {
                definition.push_str(" primary key");
            } else if column.constraint.unique {
                definition.push_str(" unique");
            }
            return definition;
        }

        format!(
            "{} {}{}{}",
            column.name,
            column.data_type,
            default_clause(column),
            constraint_clause(&column.constraint)
        )
    }

    fn auto_increment_start(change: &CreateTable) -> Option<i64> {
        change.columns.iter().find_map(|column| match &column.individual_object {
            Some(IndividualObject::MySql {
                auto_increment_start: Some(start),
            }) if column.auto_increment => Some(*start),
            _ => None,
        })
    }

    fn require_sequences(&self) -> MigrateResult<()> {
        match self.flavor {
            MySqlFlavor::MariaDb => Ok(()),
            MySqlFlavor::MySql => Err(MigrateError::unsupported(
                self.dialect_name(),
                "MySQL does not support sequences",
            )),
        }
    }
}

impl DdlGenerator for MySqlDdlGenerator {
    fn dialect_name(&self) -> &'static str {
        match self.flavor {
            MySqlFlavor::MySql => "mysql",
            MySqlFlavor::MariaDb => "mariadb",
        }
    }

    fn display_name(&self) -> &'static str {
        match self.flavor {
            MySqlFlavor::MySql => "MySQL",
            MySqlFlavor::MariaDb => "MariaDB",
        }
    }

    fn create_table(&self, change: &CreateTable) -> MigrateResult<String> {
        let columns = change
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        let mut sql = create_table_statement(change, columns);
        if let Some(start) = Self::auto_increment_start(change) {
            sql.push_str(&format!(" auto_increment = {}", start));
        }
        normalized(sql)
    }

    /// AFTER is native. BEFORE has no MySQL counterpart and is rendered as
    /// FIRST, which is only exact when the named column leads the table.
    fn add_column(&self, change: &AddColumn) -> MigrateResult<String> {
        let position = match (&change.after_column, &change.before_column) {
            (Some(_), Some(_)) => return Err(both_positions_error(self, change)),
            (Some(after), None) => format!(" after {}", after),
            (None, Some(before)) => {
                warn!(
                    "{} has no BEFORE clause; placing {}.{} first (assumes {} is the leading column)",
                    self.display_name(),
                    change.table_name,
                    change.column.name,
                    before
                );
                " first".to_string()
            }
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
        normalized(format!("rename table {} to {}", change.old_name, change.new_name))
    }

    fn rename_column(&self, change: &RenameColumn) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} rename column {} to {}",
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
            "alter table {} modify column {} {}",
            change.table_name, change.column_name, change.new_type
        ))
    }

    // MODIFY COLUMN redefines the whole column, so the default rides along
    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} modify column {} {}{} not null",
            change.table_name,
            change.column_name,
            change.column_type,
            not_null_default(change)
        ))
    }

    fn add_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String> {
        normalized(add_unique_statement(change))
    }

    fn create_sequence(&self, change: &CreateSequence) -> MigrateResult<String> {
        self.require_sequences()?;
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
            "alter table {} drop foreign key {}",
            change.table_name, change.constraint_name
        ))
    }

    fn drop_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(format!("drop index {} on {}", change.index_name, change.table_name))
    }

    fn drop_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} modify column {} {}{} null",
            change.table_name,
            change.column_name,
            change.column_type,
            not_null_default(change)
        ))
    }

    fn drop_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} drop index {}",
            change.table_name, change.constraint_name
        ))
    }

    fn drop_sequence(&self, change: &CreateSequence) -> MigrateResult<String> {
        self.require_sequences()?;
        normalized(format!("drop sequence {}", change.name))
    }
}

fn not_null_default(change: &AddNotNullConstraint) -> String {
    change
        .default_value
        .as_ref()
        .map(|default| format!(" default {}", default))
        .unwrap_or_default()
}
