//! Column definitions used by `CreateTable` and `AddColumn`

use serde::{Deserialize, Serialize};

/// Nullability, primary key and uniqueness flags of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConstraint {
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}

impl Default for ColumnConstraint {
    fn default() -> Self {
        Self {
            nullable: true,
            primary_key: false,
            unique: false,
        }
    }
}

/// How an identity column obtains its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityGeneration {
    /// `GENERATED ALWAYS AS IDENTITY`: explicit inserts are rejected
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`
    ByDefault,
}

impl IdentityGeneration {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IdentityGeneration::Always => "always",
            IdentityGeneration::ByDefault => "by default",
        }
    }

    /// Parse the catalog spelling (`ALWAYS`, `BY DEFAULT`, or PostgreSQL's `a`/`d`)
    pub fn from_catalog(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALWAYS" | "A" => Some(IdentityGeneration::Always),
            "BY DEFAULT" | "D" => Some(IdentityGeneration::ByDefault),
            _ => None,
        }
    }
}

/// Sequence parameters of an identity column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOptions {
    pub generation: IdentityGeneration,
    pub start: Option<i64>,
    pub increment_by: Option<i64>,
    pub cycle: bool,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            generation: IdentityGeneration::ByDefault,
            start: None,
            increment_by: None,
            cycle: false,
        }
    }
}

/// PostgreSQL auto-increment flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationKind {
    /// SQL-standard identity column
    Identity,
    /// Legacy `serial` family backed by an owned sequence
    Serial,
}

/// Dialect-specific metadata attached to a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndividualObject {
    Postgres { generation_kind: GenerationKind },
    MySql { auto_increment_start: Option<i64> },
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub default_value: Option<String>,
    pub constraint: ColumnConstraint,
    pub auto_increment: bool,
    pub individual_object: Option<IndividualObject>,
    pub identity: Option<IdentityOptions>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            default_value: None,
            constraint: ColumnConstraint::default(),
            auto_increment: false,
            individual_object: None,
            identity: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.constraint.primary_key = true;
        self.constraint.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraint.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraint.unique = true;
        self
    }

    pub fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Auto-increment through an identity column with the given options
    pub fn identity(mut self, options: IdentityOptions) -> Self {
        self.auto_increment = true;
        self.identity = Some(options);
        self
    }

    /// Auto-increment through a PostgreSQL `serial`-family type
    pub fn serial(mut self) -> Self {
        self.auto_increment = true;
        self.individual_object = Some(IndividualObject::Postgres {
            generation_kind: GenerationKind::Serial,
        });
        self
    }

    pub fn individual_object(mut self, object: IndividualObject) -> Self {
        self.individual_object = Some(object);
        self
    }

    pub fn is_serial(&self) -> bool {
        matches!(
            self.individual_object,
            Some(IndividualObject::Postgres {
                generation_kind: GenerationKind::Serial
            })
        )
    }

    /// Identity generation mode, `BY DEFAULT` unless stated otherwise
    pub fn identity_generation(&self) -> IdentityGeneration {
        self.identity
            .as_ref()
            .map(|options| options.generation)
            .unwrap_or(IdentityGeneration::ByDefault)
    }
}
