//! Turning catalog details into changes

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ColumnDetail, ConstraintDetail, IndexDetail, SequenceDetail};
use crate::change::{
    AddForeignKey, AddIndex, Change, Column, ColumnConstraint, CreateSequence, CreateTable,
    ForeignKeyAction, IdentityOptions, IndividualObject,
};

/// `nextval('seq'::regclass)`, `NEXT VALUE FOR seq` and Oracle's `seq.nextval`
static SEQUENCE_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"(?i)nextval\(\s*'([^']+)'|next\s+value\s+for\s+([\w."\[\]$#]+)|([\w."$#]+)\."?nextval\b"##,
    )
    .expect("sequence default pattern is valid")
});

/// Name of the sequence a column default draws from, unqualified and unquoted
pub fn sequence_reference(default: &str) -> Option<String> {
    let captures = SEQUENCE_DEFAULT.captures(default)?;
    let reference = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str();

    let name = reference.rsplit('.').next().unwrap_or(reference);
    let name = name.trim_matches(|c| c == '"' || c == '[' || c == ']');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// One `CreateTable` for the table, preceded by any sequence its defaults
/// draw from without owning it
pub fn changes_from_columns(table: &str, columns: &[ColumnDetail], sequences: &[SequenceDetail]) -> Vec<Change> {
    let mut ordered: Vec<&ColumnDetail> = columns.iter().collect();
    ordered.sort_by_key(|detail| detail.ordinal);

    let mut changes = Vec::new();
    let mut table_columns = Vec::with_capacity(ordered.len());

    for detail in ordered {
        let mut column = Column::new(&detail.column_name, &detail.data_type).constraint(ColumnConstraint {
            nullable: detail.nullable && !detail.primary_key,
            primary_key: detail.primary_key,
            unique: detail.unique,
        });

        if detail.auto_increment {
            column = match detail.identity_generation {
                Some(generation) => column.identity(IdentityOptions {
                    generation,
                    start: detail.identity_start,
                    increment_by: detail.identity_increment,
                    cycle: detail.identity_cycle,
                }),
                None => column.auto_increment(),
            };
            if detail.auto_increment_start.is_some() {
                column = column.individual_object(IndividualObject::MySql {
                    auto_increment_start: detail.auto_increment_start,
                });
            }
        } else if let Some(default) = &detail.default_value {
            match sequence_reference(default) {
                Some(sequence_name) => {
                    let sequence = sequences
                        .iter()
                        .find(|sequence| sequence.name.eq_ignore_ascii_case(&sequence_name));
                    match sequence {
                        Some(sequence) if sequence.is_owned_by(table, &detail.column_name) => {
                            column = column.serial();
                        }
                        // Recreated by its owning serial or identity column
                        Some(sequence) if sequence.owned_by.is_some() => {
                            column = column.default_value(default);
                        }
                        Some(sequence) => {
                            changes.push(sequence.to_change().into());
                            column = column.default_value(default);
                        }
                        None => {
                            changes.push(CreateSequence::new(sequence_name).into());
                            column = column.default_value(default);
                        }
                    }
                }
                None => column = column.default_value(default),
            }
        }

        table_columns.push(column);
    }

    changes.push(CreateTable::new(table, table_columns).into());
    changes
}

/// Group foreign key rows into one `AddForeignKey` per constraint.
///
/// `NO ACTION` is the catalog default and is left unset.
pub fn foreign_keys_from_constraints<F>(constraints: &[ConstraintDetail], action: F) -> Vec<Change>
where
    F: Fn(&str) -> Option<ForeignKeyAction>,
{
    let mut grouped: BTreeMap<(&str, &str), Vec<&ConstraintDetail>> = BTreeMap::new();
    for detail in constraints {
        grouped
            .entry((detail.constraint_name.as_str(), detail.table_name.as_str()))
            .or_default()
            .push(detail);
    }

    let translate = |rule: &Option<String>| {
        rule.as_deref()
            .and_then(&action)
            .filter(|translated| *translated != ForeignKeyAction::NoAction)
    };

    grouped
        .into_values()
        .map(|mut rows| {
            rows.sort_by_key(|detail| detail.ordinal);
            let first = rows[0];

            let mut foreign_key = AddForeignKey::new(
                &first.constraint_name,
                &first.table_name,
                rows.iter().map(|detail| detail.column_name.clone()).collect(),
                &first.referenced_table,
                rows.iter().map(|detail| detail.referenced_column.clone()).collect(),
            );
            foreign_key.on_delete = translate(&first.delete_rule);
            foreign_key.on_update = translate(&first.update_rule);
            if first.deferrable {
                foreign_key = foreign_key.deferrable(first.initially_deferred);
            }
            foreign_key.into()
        })
        .collect()
}

/// Group index rows into one `AddIndex` per index
pub fn indexes_from_details(indexes: &[IndexDetail]) -> Vec<Change> {
    let mut grouped: BTreeMap<(&str, &str), Vec<&IndexDetail>> = BTreeMap::new();
    for detail in indexes {
        grouped
            .entry((detail.index_name.as_str(), detail.table_name.as_str()))
            .or_default()
            .push(detail);
    }

    grouped
        .into_values()
        .map(|mut rows| {
            rows.sort_by_key(|detail| detail.ordinal);
            let first = rows[0];
            let index = AddIndex::new(
                &first.index_name,
                &first.table_name,
                rows.iter().map(|detail| detail.column_name.clone()).collect(),
            );
            if first.unique {
                index.unique().into()
            } else {
                index.into()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{GenerationKind, IdentityGeneration};

    fn column(name: &str, data_type: &str, ordinal: i64) -> ColumnDetail {
        ColumnDetail {
            table_name: "orders".to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            default_value: None,
            nullable: true,
            primary_key: false,
            unique: false,
            ordinal,
            auto_increment: false,
            identity_generation: None,
            identity_start: None,
            identity_increment: None,
            identity_cycle: false,
            auto_increment_start: None,
        }
    }

    fn sequence(name: &str, owner: Option<(&str, &str)>) -> SequenceDetail {
        SequenceDetail {
            name: name.to_string(),
            start: Some(1),
            increment_by: Some(1),
            owned_by: owner.map(|(t, c)| (t.to_string(), c.to_string())),
            ..Default::default()
        }
    }

    fn create_table(changes: &[Change]) -> &CreateTable {
        match changes.last() {
            Some(Change::CreateTable(table)) => table,
            other => panic!("Expected CreateTable last, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_reference_spellings() {
        assert_eq!(
            sequence_reference("nextval('orders_id_seq'::regclass)").as_deref(),
            Some("orders_id_seq")
        );
        assert_eq!(
            sequence_reference("nextval('public.\"Order_Seq\"'::regclass)").as_deref(),
            Some("Order_Seq")
        );
        assert_eq!(
            sequence_reference("(NEXT VALUE FOR [dbo].[order_seq])").as_deref(),
            Some("order_seq")
        );
        assert_eq!(
            sequence_reference("\"APP\".\"ORDER_SEQ\".\"NEXTVAL\"").as_deref(),
            Some("ORDER_SEQ")
        );
        assert_eq!(sequence_reference("'nextval'"), None);
        assert_eq!(sequence_reference("0"), None);
    }

    #[test]
    fn test_columns_keep_catalog_order_and_flags() {
        let mut id = column("id", "bigint", 1);
        id.primary_key = true;
        let mut code = column("code", "varchar(20)", 2);
        code.unique = true;
        code.nullable = false;
        let mut note = column("note", "text", 3);
        note.default_value = Some("'none'::text".to_string());

        let changes = changes_from_columns("orders", &[note, code, id], &[]);
        let table = create_table(&changes);

        assert_eq!(changes.len(), 1);
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "code", "note"]);
        assert!(table.columns[0].constraint.primary_key);
        assert!(!table.columns[0].constraint.nullable);
        assert!(table.columns[1].constraint.unique);
        assert_eq!(table.columns[2].default_value.as_deref(), Some("'none'::text"));
    }

    #[test]
    fn test_identity_column_keeps_generation_mode() {
        let mut id = column("id", "bigint", 1);
        id.auto_increment = true;
        id.identity_generation = Some(IdentityGeneration::Always);
        id.identity_start = Some(10);

        let changes = changes_from_columns("orders", &[id], &[]);
        let column = &create_table(&changes).columns[0];

        assert!(column.auto_increment);
        assert_eq!(column.identity_generation(), IdentityGeneration::Always);
        assert_eq!(column.identity.as_ref().and_then(|o| o.start), Some(10));
    }

    #[test]
    fn test_mysql_auto_increment_keeps_next_value() {
        let mut id = column("id", "int", 1);
        id.auto_increment = true;
        id.auto_increment_start = Some(42);

        let changes = changes_from_columns("orders", &[id], &[]);
        let column = &create_table(&changes).columns[0];

        assert!(column.auto_increment);
        assert!(column.identity.is_none());
        assert_eq!(
            column.individual_object,
            Some(IndividualObject::MySql {
                auto_increment_start: Some(42)
            })
        );
    }

    #[test]
    fn test_owned_sequence_default_becomes_serial() {
        let mut id = column("id", "integer", 1);
        id.default_value = Some("nextval('orders_id_seq'::regclass)".to_string());
        let sequences = [sequence("orders_id_seq", Some(("orders", "id")))];

        let changes = changes_from_columns("orders", &[id], &sequences);
        assert_eq!(changes.len(), 1);

        let column = &create_table(&changes).columns[0];
        assert!(column.is_serial());
        assert_eq!(
            column.individual_object,
            Some(IndividualObject::Postgres {
                generation_kind: GenerationKind::Serial
            })
        );
        assert!(column.default_value.is_none());
    }

    #[test]
    fn test_shared_sequence_default_is_kept() {
        let mut number = column("number", "bigint", 1);
        number.default_value = Some("nextval('invoice_numbers'::regclass)".to_string());
        let sequences = [sequence("invoice_numbers", None)];

        let changes = changes_from_columns("orders", &[number], &sequences);
        assert_eq!(changes.len(), 2);
        match &changes[0] {
            Change::CreateSequence(seq) => {
                assert_eq!(seq.name, "invoice_numbers");
                assert_eq!(seq.start, Some(1));
            }
            other => panic!("Expected CreateSequence, got {:?}", other),
        }
        let column = &create_table(&changes).columns[0];
        assert!(!column.auto_increment);
        assert_eq!(
            column.default_value.as_deref(),
            Some("nextval('invoice_numbers'::regclass)")
        );
    }

    #[test]
    fn test_sequence_owned_by_another_column_is_not_serial() {
        let mut copy = column("legacy_id", "integer", 1);
        copy.default_value = Some("nextval('customers_id_seq'::regclass)".to_string());
        let sequences = [sequence("customers_id_seq", Some(("customers", "id")))];

        let changes = changes_from_columns("orders", &[copy], &sequences);
        assert_eq!(changes.len(), 1);
        assert!(!changes.iter().any(|change| matches!(change, Change::CreateSequence(_))));

        let column = &create_table(&changes).columns[0];
        assert!(!column.is_serial());
        assert_eq!(
            column.default_value.as_deref(),
            Some("nextval('customers_id_seq'::regclass)")
        );
    }

    fn fk_row(name: &str, column: &str, referenced: &str, ordinal: i64) -> ConstraintDetail {
        ConstraintDetail {
            constraint_name: name.to_string(),
            table_name: "order_lines".to_string(),
            column_name: column.to_string(),
            referenced_table: "orders".to_string(),
            referenced_column: referenced.to_string(),
            ordinal,
            delete_rule: Some("c".to_string()),
            update_rule: Some("a".to_string()),
            deferrable: false,
            initially_deferred: false,
        }
    }

    #[test]
    fn test_foreign_key_rows_group_into_composite_keys() {
        let rows = vec![
            fk_row("fk_lines_order", "order_region", "region", 2),
            fk_row("fk_lines_order", "order_id", "id", 1),
            fk_row("fk_lines_product", "product_id", "id", 1),
        ];

        let changes = foreign_keys_from_constraints(&rows, ForeignKeyAction::from_postgres_code);
        assert_eq!(changes.len(), 2);

        match &changes[0] {
            Change::AddForeignKey(fk) => {
                assert_eq!(fk.constraint_name, "fk_lines_order");
                assert_eq!(fk.column_names, ["order_id", "order_region"]);
                assert_eq!(fk.referenced_columns, ["id", "region"]);
                assert_eq!(fk.on_delete, Some(ForeignKeyAction::Cascade));
                assert_eq!(fk.on_update, None);
            }
            other => panic!("Expected AddForeignKey, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_key_deferrable_flags() {
        let mut row = fk_row("fk_deferred", "order_id", "id", 1);
        row.deferrable = true;
        row.initially_deferred = true;
        row.delete_rule = Some("SET NULL".to_string());

        let changes = foreign_keys_from_constraints(&[row], ForeignKeyAction::from_rule);
        match &changes[0] {
            Change::AddForeignKey(fk) => {
                assert!(fk.deferrable && fk.initially_deferred);
                assert_eq!(fk.on_delete, Some(ForeignKeyAction::SetNull));
            }
            other => panic!("Expected AddForeignKey, got {:?}", other),
        }
    }

    #[test]
    fn test_index_rows_group_by_name() {
        let row = |name: &str, column: &str, ordinal: i64, unique: bool| IndexDetail {
            index_name: name.to_string(),
            table_name: "orders".to_string(),
            column_name: column.to_string(),
            ordinal,
            unique,
        };
        let changes = indexes_from_details(&[
            row("idx_orders_customer_date", "placed_at", 2, false),
            row("idx_orders_customer_date", "customer_id", 1, false),
            row("ux_orders_ref", "reference", 1, true),
        ]);

        assert_eq!(
            changes,
            vec![
                AddIndex::new(
                    "idx_orders_customer_date",
                    "orders",
                    vec!["customer_id".to_string(), "placed_at".to_string()]
                )
                .into(),
                AddIndex::new("ux_orders_ref", "orders", vec!["reference".to_string()])
                    .unique()
                    .into(),
            ]
        );
    }
}
