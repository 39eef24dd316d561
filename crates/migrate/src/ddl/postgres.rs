//! PostgreSQL DDL generator

use super::*;

#[derive(Debug, Default, Clone)]
pub struct PostgresDdlGenerator;

impl PostgresDdlGenerator {
    pub fn new() -> Self {
        Self
    }

    fn column_definition(&self, column: &Column) -> String {
        if column.auto_increment {
            if column.is_serial() {
                return format!(
                    "{} {}{}",
                    column.name,
                    serial_type(&column.data_type),
                    constraint_clause(&column.constraint)
                );
            }
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

/// Map an integer type onto its `serial` family member
fn serial_type(data_type: &str) -> &'static str {
    match data_type.trim().to_ascii_lowercase().as_str() {
        "smallint" | "int2" | "smallserial" | "serial2" => "smallserial",
        "bigint" | "int8" | "bigserial" | "serial8" => "bigserial",
        _ => "serial",
    }
}

impl DdlGenerator for PostgresDdlGenerator {
    fn dialect_name(&self) -> &'static str {
        "postgresql"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
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
        if change.is_positional() {
            return Err(positional_unsupported(self));
        }
        normalized(format!(
            "alter table {} add column {}",
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

    fn add_foreign_key(&self, change: &AddForeignKey) -> MigrateResult<String> {
        normalized(foreign_key_statement(change))
    }

    fn add_index(&self, change: &AddIndex) -> MigrateResult<String> {
        normalized(create_index_statement(change))
    }

    fn modify_data_type(&self, change: &ModifyDataType) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} type {}",
            change.table_name, change.column_name, change.new_type
        ))
    }

    fn add_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        match &change.default_value {
            Some(default) => normalized(format!(
                "alter table {table} alter column {column} set default {default}, alter column {column} set not null",
                table = change.table_name,
                column = change.column_name,
                default = default
            )),
            None => normalized(format!(
                "alter table {} alter column {} set not null",
                change.table_name, change.column_name
            )),
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

    /// Only NOT NULL is removed; a default set alongside it stays in place.
    fn drop_not_null_constraint(&self, change: &AddNotNullConstraint) -> MigrateResult<String> {
        normalized(format!(
            "alter table {} alter column {} drop not null",
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
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ForeignKeyAction, IdentityGeneration, IdentityOptions};

    fn generator() -> PostgresDdlGenerator {
        PostgresDdlGenerator::new()
    }

    #[test]
    fn test_create_table_with_primary_key() {
        let change = CreateTable::new(
            "migrations",
            vec![Column::new("version", "character varying(255)").primary_key()],
        );

        assert_eq!(
            generator().create_table(&change).unwrap(),
            "create table migrations (\nversion character varying(255) primary key\n)"
        );
        assert_eq!(generator().drop_table(&change).unwrap(), "drop table migrations");
    }

    #[test]
    fn test_create_table_keeps_column_order_and_flags() {
        let change = CreateTable::new(
            "users",
            vec![
                Column::new("id", "bigint").identity(IdentityOptions {
                    generation: IdentityGeneration::Always,
                    start: Some(100),
                    increment_by: Some(5),
                    cycle: false,
                }).primary_key(),
                Column::new("email", "text").not_null().unique(),
                Column::new("active", "boolean").default_value("true"),
            ],
        )
        .if_not_exists();

        assert_eq!(
            generator().create_table(&change).unwrap(),
            "create table if not exists users (\n\
             id bigint generated always as identity (start with 100 increment by 5) primary key,\n\
             email text not null unique,\n\
             active boolean default true\n\
             )"
        );
    }

    #[test]
    fn test_auto_increment_defaults_to_by_default_identity() {
        let change = CreateTable::new("t", vec![Column::new("id", "integer").auto_increment().primary_key()]);
        assert_eq!(
            generator().create_table(&change).unwrap(),
            "create table t (\nid integer generated by default as identity primary key\n)"
        );
    }

    #[test]
    fn test_serial_columns_use_serial_types() {
        let change = CreateTable::new(
            "counters",
            vec![
                Column::new("a", "smallint").serial(),
                Column::new("b", "integer").serial(),
                Column::new("c", "bigint").serial().primary_key(),
            ],
        );

        assert_eq!(
            generator().create_table(&change).unwrap(),
            "create table counters (\na smallserial,\nb serial,\nc bigserial primary key\n)"
        );
    }

    #[test]
    fn test_positional_add_column_is_rejected() {
        let change = AddColumn::new("users", Column::new("nickname", "text")).after("x");
        let err = generator().add_column(&change).unwrap_err();
        assert_eq!(
            err.to_string(),
            "PostgreSQL does not support AFTER or BEFORE clauses in ADD COLUMN statements"
        );

        let change = AddColumn::new("users", Column::new("nickname", "text")).before("x");
        assert!(generator().add_column(&change).is_err());
    }

    #[test]
    fn test_add_and_drop_column() {
        let change = AddColumn::new("users", Column::new("nickname", "text").not_null().default_value("''"));
        assert_eq!(
            generator().add_column(&change).unwrap(),
            "alter table users add column nickname text default '' not null"
        );
        assert_eq!(
            generator().drop_column(&change).unwrap(),
            "alter table users drop column nickname"
        );
    }

    #[test]
    fn test_composite_foreign_key_with_optional_clauses() {
        let change = AddForeignKey::new(
            "fk_order_lines_order",
            "order_lines",
            vec!["order_id".into(), "tenant_id".into()],
            "orders",
            vec!["id".into(), "tenant_id".into()],
        );

        assert_eq!(
            generator().add_foreign_key(&change).unwrap(),
            "alter table order_lines add constraint fk_order_lines_order foreign key (order_id, tenant_id) references orders (id, tenant_id)"
        );

        let change = change
            .on_delete(ForeignKeyAction::Cascade)
            .on_update(ForeignKeyAction::SetNull)
            .deferrable(true);
        assert_eq!(
            generator().add_foreign_key(&change).unwrap(),
            "alter table order_lines add constraint fk_order_lines_order foreign key (order_id, tenant_id) references orders (id, tenant_id) on delete cascade on update set null deferrable initially deferred"
        );
        assert_eq!(
            generator().drop_foreign_key(&change).unwrap(),
            "alter table order_lines drop constraint fk_order_lines_order"
        );
    }

    #[test]
    fn test_not_null_with_default_sets_default_first() {
        let change = AddNotNullConstraint::new("users", "active", "boolean").default_value("true");

        assert_eq!(
            generator().add_not_null_constraint(&change).unwrap(),
            "alter table users alter column active set default true, alter column active set not null"
        );
        assert_eq!(
            generator().drop_not_null_constraint(&change).unwrap(),
            "alter table users alter column active drop not null"
        );
    }

    #[test]
    fn test_index_unique_and_sequence() {
        let index = AddIndex::new("idx_users_email", "users", vec!["email".into()]).unique();
        assert_eq!(
            generator().add_index(&index).unwrap(),
            "create unique index idx_users_email on users (email)"
        );
        assert_eq!(generator().drop_index(&index).unwrap(), "drop index idx_users_email");

        let unique = AddUniqueConstraint::new("uq_users_name", "users", vec!["first".into(), "last".into()]);
        assert_eq!(
            generator().add_unique_constraint(&unique).unwrap(),
            "alter table users add constraint uq_users_name unique (first, last)"
        );

        let sequence = CreateSequence {
            name: "invoice_no".into(),
            data_type: Some("bigint".into()),
            start: Some(1000),
            min: Some(1000),
            max: None,
            increment_by: Some(1),
            cycle: true,
            cache_size: Some(20),
        };
        assert_eq!(
            generator().create_sequence(&sequence).unwrap(),
            "create sequence invoice_no as bigint start with 1000 increment by 1 minvalue 1000 cycle cache 20"
        );
        assert_eq!(generator().drop_sequence(&sequence).unwrap(), "drop sequence invoice_no");
    }

    #[test]
    fn test_history_plumbing() {
        assert_eq!(generator().placeholder(2), "$2");
        assert_eq!(
            generator().lock_rows_sql("change_set_history"),
            "select id from change_set_history for update"
        );
    }
}
