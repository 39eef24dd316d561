//! DDL Generators
//!
//! A `DdlGenerator` renders one dialect's SQL for every `Change` variant
//! (forward) and for the reverse operations used by rollback. Renames and
//! data type changes are symmetric: their rollback is the forward renderer
//! applied to the swapped change, see [`reverse_rename_table`],
//! [`reverse_rename_column`] and [`reverse_modify_data_type`].
//!
//! Every generator passes its output through [`normalize_whitespace`], and
//! multi-statement groups are joined with `";\n"` so that
//! [`split_statements`] can recover them before execution.

pub mod h2;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlserver;

use std::fmt;

use crate::change::{
    AddColumn, AddForeignKey, AddIndex, AddNotNullConstraint, AddUniqueConstraint, Column,
    ColumnConstraint, CreateSequence, CreateTable, ModifyDataType, RenameColumn, RenameTable,
};
use crate::error::{MigrateError, MigrateResult};

pub use h2::H2DdlGenerator;
pub use mysql::{MySqlDdlGenerator, MySqlFlavor};
pub use oracle::OracleDdlGenerator;
pub use postgres::PostgresDdlGenerator;
pub use sqlserver::SqlServerDdlGenerator;

/// Separator between statements of one statement group
pub const STATEMENT_SEPARATOR: &str = ";\n";

/// Column types a dialect uses for the change set history table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryColumnTypes {
    pub id: &'static str,
    pub text: &'static str,
    pub timestamp: &'static str,
}

impl Default for HistoryColumnTypes {
    fn default() -> Self {
        Self {
            id: "bigint",
            text: "varchar(255)",
            timestamp: "timestamp",
        }
    }
}

/// Per-dialect translation of changes into SQL
pub trait DdlGenerator: Send + Sync + fmt::Debug {
    /// Registry name, e.g. `postgresql`
    fn dialect_name(&self) -> &'static str;

    /// Human-readable product name used in error messages
    fn display_name(&self) -> &'static str;

    fn create_table(&self, change: &CreateTable) -> MigrateResult<String>;
    fn add_column(&self, change: &AddColumn) -> MigrateResult<String>;
    fn rename_table(&self, change: &RenameTable) -> MigrateResult<String>;
    fn rename_column(&self, change: &RenameColumn) -> MigrateResult<String>;
    fn add_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String>;
    fn add_index(&self, change: &AddIndex) -> MigrateResult<String>;
    fn modify_data_type(&self, change: &ModifyDataType) -> MigrateResult<String>;
    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String>;
    fn add_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String>;
    fn create_sequence(&self, change: &CreateSequence) -> MigrateResult<String>;

    fn drop_table(&self, change: &CreateTable) -> MigrateResult<String>;
    fn drop_column(&self, change: &AddColumn) -> MigrateResult<String>;
    fn drop_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String>;
    fn drop_index(&self, change: &AddIndex) -> MigrateResult<String>;
    fn drop_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String>;
    fn drop_unique_constraint(&self, change: &AddUniqueConstraint) -> MigrateResult<String>;
    fn drop_sequence(&self, change: &CreateSequence) -> MigrateResult<String>;

    /// Bind parameter placeholder for the 1-based `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Statement that locks the history table rows for the current transaction
    fn lock_rows_sql(&self, table: &str) -> String {
        format!("select id from {} for update", table)
    }

    fn history_column_types(&self) -> HistoryColumnTypes {
        HistoryColumnTypes::default()
    }
}

/// Rollback of `RenameTable`: rename back
pub fn reverse_rename_table<G>(generator: &G, change: &RenameTable) -> MigrateResult<String>
where
    G: DdlGenerator + ?Sized,
{
    generator.rename_table(&change.reversed())
}

/// Rollback of `RenameColumn`: rename back
pub fn reverse_rename_column<G>(generator: &G, change: &RenameColumn) -> MigrateResult<String>
where
    G: DdlGenerator + ?Sized,
{
    generator.rename_column(&change.reversed())
}

/// Rollback of `ModifyDataType`: restore `old_type`.
///
/// Fails with [`MigrateError::MissingRollbackType`] when the previous type
/// was not recorded, rather than rendering a column with an empty type.
pub fn reverse_modify_data_type<G>(generator: &G, change: &ModifyDataType) -> MigrateResult<String>
where
    G: DdlGenerator + ?Sized,
{
    let old_type = change
        .old_type
        .as_ref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| MigrateError::MissingRollbackType {
            table: change.table_name.clone(),
            column: change.column_name.clone(),
        })?;

    generator.modify_data_type(&ModifyDataType {
        table_name: change.table_name.clone(),
        column_name: change.column_name.clone(),
        new_type: old_type.clone(),
        old_type: Some(change.new_type.clone()),
    })
}

/// Collapse runs of blanks inside each line, trim lines and drop empty ones
pub fn normalize_whitespace(ddl: &str) -> String {
    ddl.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a statement group into individually executable statements.
///
/// Anonymous `begin ... end;` blocks keep their terminating semicolon.
pub fn split_statements(ddl: &str) -> Vec<String> {
    ddl.split(STATEMENT_SEPARATOR)
        .map(|statement| {
            let statement = statement.trim();
            if is_block(statement) {
                statement
            } else {
                statement.trim_end_matches(';').trim()
            }
        })
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_block(statement: &str) -> bool {
    let lower = statement.to_ascii_lowercase();
    lower.starts_with("begin") || lower.starts_with("declare")
}

pub(crate) fn normalized(ddl: String) -> MigrateResult<String> {
    Ok(normalize_whitespace(&ddl))
}

pub(crate) fn statement_group(statements: &[String]) -> MigrateResult<String> {
    let normalized: Vec<String> = statements.iter().map(|s| normalize_whitespace(s)).collect();
    Ok(normalized.join(STATEMENT_SEPARATOR))
}

pub(crate) fn column_list(columns: &[String]) -> String {
    columns.join(", ")
}

/// ` default X`, or nothing
pub(crate) fn default_clause(column: &Column) -> String {
    match &column.default_value {
        Some(value) => format!(" default {}", value),
        None => String::new(),
    }
}

/// ` primary key` (implies not null) or ` not null`, then ` unique`
pub(crate) fn constraint_clause(constraint: &ColumnConstraint) -> String {
    let mut clause = String::new();
    if constraint.primary_key {
        clause.push_str(" primary key");
    } else {
        if !constraint.nullable {
            clause.push_str(" not null");
        }
        if constraint.unique {
            clause.push_str(" unique");
        }
    }
    clause
}

/// ` generated <mode> as identity[ (<options>)]` for SQL-standard identity columns
pub(crate) fn identity_clause(column: &Column) -> String {
    let mut options = Vec::new();
    if let Some(identity) = &column.identity {
        if let Some(start) = identity.start {
            options.push(format!("start with {}", start));
        }
        if let Some(increment) = identity.increment_by {
            options.push(format!("increment by {}", increment));
        }
        if identity.cycle {
            options.push("cycle".to_string());
        }
    }

    let mut clause = format!(
        " generated {} as identity",
        column.identity_generation().as_sql()
    );
    if !options.is_empty() {
        clause.push_str(&format!(" ({})", options.join(" ")));
    }
    clause
}

/// `create table` wrapper shared by dialects with the plain syntax
pub(crate) fn create_table_statement(change: &CreateTable, column_definitions: Vec<String>) -> String {
    format!(
        "create table {}{} (\n{}\n)",
        if change.if_not_exists { "if not exists " } else { "" },
        change.table_name,
        column_definitions.join(",\n")
    )
}

/// `alter table .. add constraint .. foreign key ..` with optional trailing clauses
pub(crate) fn foreign_key_statement(change: &AddForeignKey) -> String {
    let mut sql = format!(
        "alter table {} add constraint {} foreign key ({}) references {} ({})",
        change.table_name,
        change.constraint_name,
        column_list(&change.column_names),
        change.referenced_table,
        column_list(&change.referenced_columns)
    );
    if let Some(action) = change.on_delete {
        sql.push_str(&format!(" on delete {}", action.as_sql()));
    }
    if let Some(action) = change.on_update {
        sql.push_str(&format!(" on update {}", action.as_sql()));
    }
    if change.deferrable {
        sql.push_str(" deferrable");
    }
    if change.initially_deferred {
        sql.push_str(" initially deferred");
    }
    sql
}

pub(crate) fn create_index_statement(change: &AddIndex) -> String {
    format!(
        "create {}index {} on {} ({})",
        if change.unique { "unique " } else { "" },
        change.index_name,
        change.table_name,
        column_list(&change.column_names)
    )
}

pub(crate) fn add_unique_statement(change: &AddUniqueConstraint) -> String {
    format!(
        "alter table {} add constraint {} unique ({})",
        change.table_name,
        change.constraint_name,
        column_list(&change.column_names)
    )
}

/// `create sequence <name>[ as <type>]` followed by the set options
pub(crate) fn create_sequence_statement(change: &CreateSequence, with_type: bool) -> String {
    let mut sql = format!("create sequence {}", change.name);
    if with_type {
        if let Some(data_type) = &change.data_type {
            sql.push_str(&format!(" as {}", data_type));
        }
    }
    if let Some(start) = change.start {
        sql.push_str(&format!(" start with {}", start));
    }
    if let Some(increment) = change.increment_by {
        sql.push_str(&format!(" increment by {}", increment));
    }
    if let Some(min) = change.min {
        sql.push_str(&format!(" minvalue {}", min));
    }
    if let Some(max) = change.max {
        sql.push_str(&format!(" maxvalue {}", max));
    }
    if change.cycle {
        sql.push_str(" cycle");
    }
    if let Some(cache) = change.cache_size {
        sql.push_str(&format!(" cache {}", cache));
    }
    sql
}

pub(crate) fn positional_unsupported(generator: &dyn DdlGenerator) -> MigrateError {
    MigrateError::unsupported(
        generator.dialect_name(),
        format!(
            "{} does not support AFTER or BEFORE clauses in ADD COLUMN statements",
            generator.display_name()
        ),
    )
}

pub(crate) fn both_positions_error(generator: &dyn DdlGenerator, change: &AddColumn) -> MigrateError {
    MigrateError::unsupported(
        generator.dialect_name(),
        format!(
            "Column {}.{} cannot be placed both AFTER and BEFORE another column",
            change.table_name, change.column.name
        ),
    )
}

pub(crate) fn deferrable_unsupported(generator: &dyn DdlGenerator, change: &AddForeignKey) -> MigrateError {
    MigrateError::unsupported(
        generator.dialect_name(),
        format!(
            "{} does not support deferrable foreign key constraints ({})",
            generator.display_name(),
            change.constraint_name
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let ddl = "create   table  t (\n    id  bigint   \n\n   )  ";
        assert_eq!(normalize_whitespace(ddl), "create table t (\nid bigint\n)");
    }

    #[test]
    fn test_split_statements() {
        let group = "alter table t add default 1 for c;\nalter table t alter column c int not null";
        assert_eq!(
            split_statements(group),
            vec![
                "alter table t add default 1 for c".to_string(),
                "alter table t alter column c int not null".to_string(),
            ]
        );
        assert_eq!(split_statements("drop table t"), vec!["drop table t".to_string()]);
        assert!(split_statements("  ").is_empty());
        assert_eq!(
            split_statements("begin execute immediate 'drop table t'; end;"),
            vec!["begin execute immediate 'drop table t'; end;".to_string()]
        );
    }

    #[test]
    fn test_reverse_modify_data_type_requires_old_type() {
        let generator = PostgresDdlGenerator::new();
        let change = ModifyDataType::new("users", "age", "bigint");

        match reverse_modify_data_type(&generator, &change) {
            Err(MigrateError::MissingRollbackType { table, column }) => {
                assert_eq!(table, "users");
                assert_eq!(column, "age");
            }
            other => panic!("Expected MissingRollbackType, got {:?}", other),
        }

        let change = change.from_type("integer");
        assert_eq!(
            reverse_modify_data_type(&generator, &change).unwrap(),
            "alter table users alter column age type integer"
        );
    }

    #[test]
    fn test_reverse_renames_swap_names() {
        let generator = PostgresDdlGenerator::new();
        assert_eq!(
            reverse_rename_table(&generator, &RenameTable::new("users", "accounts")).unwrap(),
            "alter table accounts rename to users"
        );
        assert_eq!(
            reverse_rename_column(&generator, &RenameColumn::new("users", "mail", "email")).unwrap(),
            "alter table users rename column email to mail"
        );
    }

    #[test]
    fn test_constraint_clause_does_not_repeat_not_null_for_primary_key() {
        let column = Column::new("id", "bigint").primary_key().unique();
        assert_eq!(constraint_clause(&column.constraint), " primary key");

        let column = Column::new("email", "text").not_null().unique();
        assert_eq!(constraint_clause(&column.constraint), " not null unique");
    }
}
