//! Change Model
//!
//! A `Change` is one atomic, reversible schema operation. The set of variants
//! is closed: every dispatcher (`MigrateEngine`, the DDL generators, the
//! introspection sort) matches on it exhaustively, so a new variant fails to
//! compile until each of them handles it.

pub mod change_set;
pub mod column;
pub mod foreign_key;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use change_set::{ChangeSet, ChangeSetBuilder};
pub use column::{
    Column, ColumnConstraint, GenerationKind, IdentityGeneration, IdentityOptions,
    IndividualObject,
};
pub use foreign_key::ForeignKeyAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    pub table_name: String,
    pub if_not_exists: bool,
    pub columns: Vec<Column>,
}

impl CreateTable {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table_name: table_name.into(),
            if_not_exists: false,
            columns,
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColumn {
    pub table_name: String,
    pub column: Column,
    pub after_column: Option<String>,
    pub before_column: Option<String>,
}

impl AddColumn {
    pub fn new(table_name: impl Into<String>, column: Column) -> Self {
        Self {
            table_name: table_name.into(),
            column,
            after_column: None,
            before_column: None,
        }
    }

    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.after_column = Some(column.into());
        self
    }

    pub fn before(mut self, column: impl Into<String>) -> Self {
        self.before_column = Some(column.into());
        self
    }

    pub fn is_positional(&self) -> bool {
        self.after_column.is_some() || self.before_column.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTable {
    pub old_name: String,
    pub new_name: String,
}

impl RenameTable {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// The rename that undoes this one
    pub fn reversed(&self) -> Self {
        Self {
            old_name: self.new_name.clone(),
            new_name: self.old_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameColumn {
    pub table_name: String,
    pub old_name: String,
    pub new_name: String,
}

impl RenameColumn {
    pub fn new(
        table_name: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            old_name: self.new_name.clone(),
            new_name: self.old_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddForeignKey {
    pub constraint_name: String,
    pub table_name: String,
    pub column_names: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
    pub deferrable: bool,
    pub initially_deferred: bool,
}

impl AddForeignKey {
    pub fn new(
        constraint_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
        referenced_table: impl Into<String>,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            table_name: table_name.into(),
            column_names,
            referenced_table: referenced_table.into(),
            referenced_columns,
            on_delete: None,
            on_update: None,
            deferrable: false,
            initially_deferred: false,
        }
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn deferrable(mut self, initially_deferred: bool) -> Self {
        self.deferrable = true;
        self.initially_deferred = initially_deferred;
        self
    }

    pub fn is_self_reference(&self) -> bool {
        self.table_name == self.referenced_table
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddIndex {
    pub index_name: String,
    pub table_name: String,
    pub column_names: Vec<String>,
    pub unique: bool,
}

impl AddIndex {
    pub fn new(
        index_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            column_names,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyDataType {
    pub table_name: String,
    pub column_name: String,
    pub new_type: String,
    /// Required to roll the change back
    pub old_type: Option<String>,
}

impl ModifyDataType {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        new_type: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            new_type: new_type.into(),
            old_type: None,
        }
    }

    pub fn from_type(mut self, old_type: impl Into<String>) -> Self {
        self.old_type = Some(old_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNotNullConstraint {
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
    pub default_value: Option<String>,
}

impl AddNotNullConstraint {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        column_type: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            column_type: column_type.into(),
            default_value: None,
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUniqueConstraint {
    pub constraint_name: String,
    pub table_name: String,
    pub column_names: Vec<String>,
}

impl AddUniqueConstraint {
    pub fn new(
        constraint_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            table_name: table_name.into(),
            column_names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateSequence {
    pub name: String,
    pub data_type: Option<String>,
    pub start: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub increment_by: Option<i64>,
    pub cycle: bool,
    pub cache_size: Option<i64>,
}

impl CreateSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A schema operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    CreateTable(CreateTable),
    AddColumn(AddColumn),
    RenameTable(RenameTable),
    RenameColumn(RenameColumn),
    AddForeignKey(AddForeignKey),
    AddIndex(AddIndex),
    ModifyDataType(ModifyDataType),
    AddNotNullConstraint(AddNotNullConstraint),
    AddUniqueConstraint(AddUniqueConstraint),
    CreateSequence(CreateSequence),
}

/// Discriminant of a `Change`, ordered by introspection output stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    CreateSequence,
    CreateTable,
    AddForeignKey,
    AddColumn,
    RenameTable,
    RenameColumn,
    AddIndex,
    ModifyDataType,
    AddNotNullConstraint,
    AddUniqueConstraint,
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::CreateTable(_) => ChangeKind::CreateTable,
            Change::AddColumn(_) => ChangeKind::AddColumn,
            Change::RenameTable(_) => ChangeKind::RenameTable,
            Change::RenameColumn(_) => ChangeKind::RenameColumn,
            Change::AddForeignKey(_) => ChangeKind::AddForeignKey,
            Change::AddIndex(_) => ChangeKind::AddIndex,
            Change::ModifyDataType(_) => ChangeKind::ModifyDataType,
            Change::AddNotNullConstraint(_) => ChangeKind::AddNotNullConstraint,
            Change::AddUniqueConstraint(_) => ChangeKind::AddUniqueConstraint,
            Change::CreateSequence(_) => ChangeKind::CreateSequence,
        }
    }

    /// Name of the object the change is about
    pub fn subject(&self) -> &str {
        match self {
            Change::CreateTable(c) => &c.table_name,
            Change::AddColumn(c) => &c.table_name,
            Change::RenameTable(c) => &c.old_name,
            Change::RenameColumn(c) => &c.table_name,
            Change::AddForeignKey(c) => &c.constraint_name,
            Change::AddIndex(c) => &c.index_name,
            Change::ModifyDataType(c) => &c.table_name,
            Change::AddNotNullConstraint(c) => &c.table_name,
            Change::AddUniqueConstraint(c) => &c.constraint_name,
            Change::CreateSequence(c) => &c.name,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.subject())
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Change {
                fn from(change: $variant) -> Self {
                    Change::$variant(change)
                }
            }
        )*
    };
}

impl_from_variant!(
    CreateTable,
    AddColumn,
    RenameTable,
    RenameColumn,
    AddForeignKey,
    AddIndex,
    ModifyDataType,
    AddNotNullConstraint,
    AddUniqueConstraint,
    CreateSequence,
);
