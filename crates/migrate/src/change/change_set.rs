//! Change sets: named, ordered batches of changes applied atomically

use serde::{Deserialize, Serialize};

use super::Change;

/// An identified batch of changes, recorded once in the history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Migration (class, file or module) the change set belongs to
    pub migration_class_name: String,
    /// Unique within a migration run
    pub change_set_id: String,
    /// Optional label stored with the history row
    pub tag: Option<String>,
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(
        migration_class_name: impl Into<String>,
        change_set_id: impl Into<String>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            migration_class_name: migration_class_name.into(),
            change_set_id: change_set_id.into(),
            tag: None,
            changes,
        }
    }

    pub fn builder(
        migration_class_name: impl Into<String>,
        change_set_id: impl Into<String>,
    ) -> ChangeSetBuilder {
        ChangeSetBuilder {
            migration_class_name: migration_class_name.into(),
            change_set_id: change_set_id.into(),
            tag: None,
            changes: Vec::new(),
        }
    }
}

/// Accumulates changes and produces an immutable `ChangeSet`
#[derive(Debug, Clone)]
pub struct ChangeSetBuilder {
    migration_class_name: String,
    change_set_id: String,
    tag: Option<String>,
    changes: Vec<Change>,
}

impl ChangeSetBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn change(mut self, change: impl Into<Change>) -> Self {
        self.changes.push(change.into());
        self
    }

    pub fn changes<I, C>(mut self, changes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Change>,
    {
        self.changes.extend(changes.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> ChangeSet {
        ChangeSet {
            migration_class_name: self.migration_class_name,
            change_set_id: self.change_set_id,
            tag: self.tag,
            changes: self.changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Column, CreateTable, RenameTable};

    #[test]
    fn test_builder_keeps_change_order() {
        let change_set = ChangeSet::builder("V1__users", "1")
            .tag("v1.0")
            .change(CreateTable::new("users", vec![Column::new("id", "bigint").primary_key()]))
            .change(RenameTable::new("users", "accounts"))
            .build();

        assert_eq!(change_set.change_set_id, "1");
        assert_eq!(change_set.tag.as_deref(), Some("v1.0"));
        assert_eq!(change_set.changes.len(), 2);
        assert!(matches!(change_set.changes[0], Change::CreateTable(_)));
        assert!(matches!(change_set.changes[1], Change::RenameTable(_)));
    }
}
