//! H2 (2.x) catalog reader over `INFORMATION_SCHEMA`

use super::Introspector;
use crate::change::ForeignKeyAction;

const TABLES_SQL: &str = r#"
SELECT TABLE_NAME AS table_name
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = COALESCE(?, SCHEMA())
  AND TABLE_TYPE = 'BASE TABLE'
  AND TABLE_NAME <> UPPER(?)
ORDER BY TABLE_NAME
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    c.TABLE_NAME AS table_name,
    c.COLUMN_NAME AS column_name,
    CASE
        WHEN c.CHARACTER_MAXIMUM_LENGTH IS NOT NULL
             AND c.DATA_TYPE IN ('CHARACTER VARYING', 'CHARACTER', 'BINARY VARYING', 'BINARY')
            THEN LOWER(c.DATA_TYPE) || '(' || c.CHARACTER_MAXIMUM_LENGTH || ')'
        WHEN c.DATA_TYPE IN ('NUMERIC', 'DECIMAL') AND c.NUMERIC_PRECISION IS NOT NULL
            THEN LOWER(c.DATA_TYPE) || '(' || c.NUMERIC_PRECISION || ',' || COALESCE(c.NUMERIC_SCALE, 0) || ')'
        ELSE LOWER(c.DATA_TYPE)
    END AS data_type,
    c.COLUMN_DEFAULT AS column_default,
    c.IS_NULLABLE AS is_nullable,
    EXISTS (
        SELECT 1 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
            ON k.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA AND k.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
          AND k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME
          AND k.COLUMN_NAME = c.COLUMN_NAME
    ) AS is_primary_key,
    EXISTS (
        SELECT 1 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
            ON k.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA AND k.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
        WHERE tc.CONSTRAINT_TYPE = 'UNIQUE'
          AND k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME
          AND k.COLUMN_NAME = c.COLUMN_NAME
          AND (SELECT COUNT(*) FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE x
               WHERE x.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                 AND x.CONSTRAINT_NAME = tc.CONSTRAINT_NAME) = 1
    ) AS is_unique,
    c.ORDINAL_POSITION AS ordinal_position,
    c.IS_IDENTITY AS is_auto_increment,
    c.IDENTITY_GENERATION AS identity_generation,
    c.IDENTITY_START AS identity_start,
    c.IDENTITY_INCREMENT AS identity_increment,
    c.IDENTITY_CYCLE AS identity_cycle,
    NULL AS auto_increment_start
FROM INFORMATION_SCHEMA.COLUMNS c
JOIN INFORMATION_SCHEMA.TABLES t
    ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
WHERE c.TABLE_SCHEMA = COALESCE(?, SCHEMA())
  AND t.TABLE_TYPE = 'BASE TABLE'
  AND c.TABLE_NAME <> UPPER(?)
ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    rc.CONSTRAINT_NAME AS constraint_name,
    k.TABLE_NAME AS table_name,
    k.COLUMN_NAME AS column_name,
    rk.TABLE_NAME AS referenced_table,
    rk.COLUMN_NAME AS referenced_column,
    k.ORDINAL_POSITION AS ordinal_position,
    rc.DELETE_RULE AS delete_rule,
    rc.UPDATE_RULE AS update_rule,
    FALSE AS is_deferrable,
    FALSE AS initially_deferred
FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
    ON k.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA AND k.CONSTRAINT_NAME = rc.CONSTRAINT_NAME
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE rk
    ON rk.CONSTRAINT_SCHEMA = rc.UNIQUE_CONSTRAINT_SCHEMA
   AND rk.CONSTRAINT_NAME = rc.UNIQUE_CONSTRAINT_NAME
   AND rk.ORDINAL_POSITION = k.POSITION_IN_UNIQUE_CONSTRAINT
WHERE rc.CONSTRAINT_SCHEMA = COALESCE(?, SCHEMA())
  AND k.TABLE_NAME <> UPPER(?)
ORDER BY rc.CONSTRAINT_NAME, k.ORDINAL_POSITION
"#;

// Identity columns use hidden system sequences that this view does not list
const SEQUENCES_SQL: &str = r#"
SELECT
    SEQUENCE_NAME AS sequence_name,
    LOWER(DATA_TYPE) AS data_type,
    START_VALUE AS start_value,
    MINIMUM_VALUE AS min_value,
    MAXIMUM_VALUE AS max_value,
    "INCREMENT" AS increment_by,
    CYCLE_OPTION AS cycle,
    "CACHE" AS cache_size,
    NULL AS owned_by_table,
    NULL AS owned_by_column
FROM INFORMATION_SCHEMA.SEQUENCES
WHERE SEQUENCE_SCHEMA = COALESCE(?, SCHEMA())
  AND SEQUENCE_NAME <> UPPER(?)
ORDER BY SEQUENCE_NAME
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct H2Introspector;

impl H2Introspector {
    pub fn new() -> Self {
        Self
    }
}

impl Introspector for H2Introspector {
    fn dialect_name(&self) -> &'static str {
        "h2"
    }

    fn table_list_sql(&self) -> String {
        TABLES_SQL.to_string()
    }

    fn column_details_sql(&self) -> String {
        COLUMNS_SQL.to_string()
    }

    fn constraint_details_sql(&self) -> String {
        CONSTRAINTS_SQL.to_string()
    }

    fn sequence_details_sql(&self) -> Option<String> {
        Some(SEQUENCES_SQL.to_string())
    }

    fn foreign_key_action(&self, code: &str) -> Option<ForeignKeyAction> {
        ForeignKeyAction::from_rule(code)
    }
}
