//! Referential actions and their catalog encodings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action taken on referencing rows when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "cascade",
            ForeignKeyAction::SetNull => "set null",
            ForeignKeyAction::SetDefault => "set default",
            ForeignKeyAction::Restrict => "restrict",
            ForeignKeyAction::NoAction => "no action",
        }
    }

    /// PostgreSQL `pg_constraint.confdeltype` / `confupdtype` letter
    pub fn from_postgres_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(ForeignKeyAction::NoAction),
            "r" => Some(ForeignKeyAction::Restrict),
            "c" => Some(ForeignKeyAction::Cascade),
            "n" => Some(ForeignKeyAction::SetNull),
            "d" => Some(ForeignKeyAction::SetDefault),
            _ => None,
        }
    }

    pub fn to_postgres_code(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "a",
            ForeignKeyAction::Restrict => "r",
            ForeignKeyAction::Cascade => "c",
            ForeignKeyAction::SetNull => "n",
            ForeignKeyAction::SetDefault => "d",
        }
    }

    /// SQL Server `sys.foreign_keys.*_referential_action` code
    pub fn from_sqlserver_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(ForeignKeyAction::NoAction),
            "1" => Some(ForeignKeyAction::Cascade),
            "2" => Some(ForeignKeyAction::SetNull),
            "3" => Some(ForeignKeyAction::SetDefault),
            _ => None,
        }
    }

    /// SQL Server has no RESTRICT; it is reported as NO ACTION
    pub fn to_sqlserver_code(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction | ForeignKeyAction::Restrict => "0",
            ForeignKeyAction::Cascade => "1",
            ForeignKeyAction::SetNull => "2",
            ForeignKeyAction::SetDefault => "3",
        }
    }

    /// `information_schema.referential_constraints` rule text
    pub fn from_rule(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "CASCADE" => Some(ForeignKeyAction::Cascade),
            "SET NULL" => Some(ForeignKeyAction::SetNull),
            "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
            "RESTRICT" => Some(ForeignKeyAction::Restrict),
            "NO ACTION" => Some(ForeignKeyAction::NoAction),
            _ => None,
        }
    }

    pub fn to_rule(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_rule())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ForeignKeyAction; 5] = [
        ForeignKeyAction::Cascade,
        ForeignKeyAction::SetNull,
        ForeignKeyAction::SetDefault,
        ForeignKeyAction::Restrict,
        ForeignKeyAction::NoAction,
    ];

    #[test]
    fn test_postgres_codes_are_bidirectional() {
        for action in ALL {
            assert_eq!(ForeignKeyAction::from_postgres_code(action.to_postgres_code()), Some(action));
        }
        assert_eq!(ForeignKeyAction::from_postgres_code("x"), None);
    }

    #[test]
    fn test_sqlserver_codes() {
        assert_eq!(ForeignKeyAction::from_sqlserver_code("1"), Some(ForeignKeyAction::Cascade));
        assert_eq!(ForeignKeyAction::from_sqlserver_code("3"), Some(ForeignKeyAction::SetDefault));
        assert_eq!(ForeignKeyAction::Restrict.to_sqlserver_code(), "0");
        assert_eq!(ForeignKeyAction::from_sqlserver_code("9"), None);
    }

    #[test]
    fn test_rule_text_tolerates_case_and_underscores() {
        assert_eq!(ForeignKeyAction::from_rule("set null"), Some(ForeignKeyAction::SetNull));
        assert_eq!(ForeignKeyAction::from_rule("NO_ACTION"), Some(ForeignKeyAction::NoAction));
        assert_eq!(ForeignKeyAction::from_rule("whatever"), None);
    }
}
