//! Dependency ordering of captured changes

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::warn;

use super::synthesis::sequence_reference;
use crate::change::{AddForeignKey, Change, CreateSequence, CreateTable};
use crate::error::{MigrateError, MigrateResult};

/// Order changes so each one only depends on changes before it:
/// sequences, then tables with referenced tables first, then foreign keys,
/// then everything else by kind and name.
///
/// Foreign keys naming a table that is not created here are dropped. Two
/// tables referencing each other fail with `CircularDependency`.
pub fn sort_changes_by_dependencies(changes: Vec<Change>) -> MigrateResult<Vec<Change>> {
    sort_with_sequence_owners(changes, &BTreeMap::new())
}

/// Like [`sort_changes_by_dependencies`], additionally placing a table after
/// the table whose serial or identity column owns a sequence one of its
/// column defaults draws from.
///
/// `sequence_owners` maps lower-case sequence names to the owning table.
pub fn sort_with_sequence_owners(
    changes: Vec<Change>,
    sequence_owners: &BTreeMap<String, String>,
) -> MigrateResult<Vec<Change>> {
    let mut sequences: Vec<CreateSequence> = Vec::new();
    let mut tables: BTreeMap<String, CreateTable> = BTreeMap::new();
    let mut foreign_keys: Vec<AddForeignKey> = Vec::new();
    let mut others: Vec<Change> = Vec::new();

    for change in changes {
        match change {
            Change::CreateSequence(sequence) => sequences.push(sequence),
            Change::CreateTable(table) => {
                tables.insert(table.table_name.clone(), table);
            }
            Change::AddForeignKey(foreign_key) => foreign_keys.push(foreign_key),
            other => others.push(other),
        }
    }

    foreign_keys.retain(|fk| {
        let known = tables.contains_key(&fk.table_name) && tables.contains_key(&fk.referenced_table);
        if !known {
            warn!(
                "Dropping foreign key {}: {} -> {} references a table outside the captured schema",
                fk.constraint_name, fk.table_name, fk.referenced_table
            );
        }
        known
    });

    let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for fk in &foreign_keys {
        if !fk.is_self_reference() {
            edges
                .entry(fk.table_name.as_str())
                .or_default()
                .insert(fk.referenced_table.as_str());
        }
    }
    for table in tables.values() {
        for column in &table.columns {
            let owner = column
                .default_value
                .as_deref()
                .and_then(sequence_reference)
                .and_then(|sequence| sequence_owners.get(&sequence.to_ascii_lowercase()))
                .and_then(|owner| tables.get_key_value(owner));
            if let Some((owner, _)) = owner {
                if *owner != table.table_name {
                    edges
                        .entry(table.table_name.as_str())
                        .or_default()
                        .insert(owner.as_str());
                }
            }
        }
    }

    let order = topological_order(tables.keys().map(String::as_str), &edges)?;
    let order: Vec<String> = order.into_iter().map(str::to_string).collect();

    sequences.sort_by(|a, b| a.name.cmp(&b.name));
    foreign_keys.sort_by(|a, b| a.constraint_name.cmp(&b.constraint_name));
    others.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.subject().cmp(b.subject())));

    let mut sorted = Vec::with_capacity(sequences.len() + tables.len() + foreign_keys.len() + others.len());
    sorted.extend(sequences.into_iter().map(Change::from));
    for name in order {
        if let Some(table) = tables.remove(&name) {
            sorted.push(table.into());
        }
    }
    sorted.extend(foreign_keys.into_iter().map(Change::from));
    sorted.extend(others);
    Ok(sorted)
}

/// Depth-first order where every node follows the nodes it points to.
/// Nodes are visited by name so the result is deterministic.
fn topological_order<'a>(
    nodes: impl Iterator<Item = &'a str>,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
) -> MigrateResult<Vec<&'a str>> {
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut visiting = HashSet::new();

    for node in nodes {
        visit(node, edges, &mut visiting, &mut done, &mut order)?;
    }
    Ok(order)
}

fn visit<'a>(
    node: &'a str,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    visiting: &mut HashSet<&'a str>,
    done: &mut HashSet<&'a str>,
    order: &mut Vec<&'a str>,
) -> MigrateResult<()> {
    if done.contains(node) {
        return Ok(());
    }
    if !visiting.insert(node) {
        return Err(MigrateError::CircularDependency {
            table: node.to_string(),
        });
    }

    if let Some(targets) = edges.get(node) {
        for &target in targets {
            visit(target, edges, visiting, done, order)?;
        }
    }

    visiting.remove(node);
    done.insert(node);
    order.push(node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{AddIndex, Column};

    fn table(name: &str) -> Change {
        CreateTable::new(name, vec![Column::new("id", "int")]).into()
    }

    fn fk(name: &str, from: &str, to: &str) -> Change {
        AddForeignKey::new(name, from, vec!["ref_id".to_string()], to, vec!["id".to_string()]).into()
    }

    fn subjects(changes: &[Change]) -> Vec<&str> {
        changes.iter().map(Change::subject).collect()
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let changes = vec![
            fk("fk_lines_orders", "order_lines", "orders"),
            table("order_lines"),
            fk("fk_orders_customers", "orders", "customers"),
            table("orders"),
            AddIndex::new("idx_orders_date", "orders", vec!["placed_at".to_string()]).into(),
            table("customers"),
            CreateSequence::new("seq_b").into(),
            CreateSequence::new("seq_a").into(),
        ];

        let sorted = sort_changes_by_dependencies(changes).unwrap();
        assert_eq!(
            subjects(&sorted),
            [
                "seq_a",
                "seq_b",
                "customers",
                "orders",
                "order_lines",
                "fk_lines_orders",
                "fk_orders_customers",
                "idx_orders_date",
            ]
        );
    }

    #[test]
    fn test_table_using_owned_sequence_follows_owner() {
        let accounts = CreateTable::new(
            "accounts",
            vec![Column::new("zone_ref", "integer").default_value("nextval('zones_id_seq'::regclass)")],
        );
        let zones = CreateTable::new("zones", vec![Column::new("id", "integer").serial()]);
        let owners = BTreeMap::from([("zones_id_seq".to_string(), "zones".to_string())]);

        let sorted = sort_with_sequence_owners(vec![accounts.into(), zones.into()], &owners).unwrap();
        assert_eq!(subjects(&sorted), ["zones", "accounts"]);

        let unowned = sort_changes_by_dependencies(vec![table("zones"), table("accounts")]).unwrap();
        assert_eq!(subjects(&unowned), ["accounts", "zones"]);
    }

    #[test]
    fn test_independent_tables_sort_by_name() {
        let sorted = sort_changes_by_dependencies(vec![table("b"), table("c"), table("a")]).unwrap();
        assert_eq!(subjects(&sorted), ["a", "b", "c"]);
    }

    #[test]
    fn test_self_reference_is_allowed() {
        let sorted = sort_changes_by_dependencies(vec![
            fk("fk_employee_manager", "employees", "employees"),
            table("employees"),
        ])
        .unwrap();
        assert_eq!(subjects(&sorted), ["employees", "fk_employee_manager"]);
    }

    #[test]
    fn test_mutual_references_are_rejected() {
        let err = sort_changes_by_dependencies(vec![
            table("a"),
            table("b"),
            fk("fk_a_b", "a", "b"),
            fk("fk_b_a", "b", "a"),
        ])
        .unwrap_err();

        match err {
            MigrateError::CircularDependency { table } => assert_eq!(table, "a"),
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_longer_cycle_is_rejected() {
        let result = sort_changes_by_dependencies(vec![
            table("a"),
            table("b"),
            table("c"),
            fk("fk_a", "a", "b"),
            fk("fk_b", "b", "c"),
            fk("fk_c", "c", "a"),
        ]);
        assert!(matches!(result, Err(MigrateError::CircularDependency { .. })));
    }

    #[test]
    fn test_foreign_key_to_unknown_table_is_dropped() {
        let sorted = sort_changes_by_dependencies(vec![
            table("orders"),
            fk("fk_orders_archive", "orders", "archived_customers"),
            fk("fk_ghost", "ghost", "orders"),
        ])
        .unwrap();
        assert_eq!(subjects(&sorted), ["orders"]);
    }
}
