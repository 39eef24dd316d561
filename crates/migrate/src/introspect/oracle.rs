//! Oracle catalog reader over the `ALL_*` views
//!
//! Unquoted Oracle identifiers are stored upper-case, so the excluded
//! history names are compared with `UPPER(:2)`.

use super::Introspector;
use crate::change::ForeignKeyAction;

const CURRENT_SCHEMA: &str = "SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA')";

const TABLES_SQL: &str = r#"
SELECT t.table_name AS table_name
FROM all_tables t
WHERE t.owner = COALESCE(:1, {schema})
  AND t.table_name <> UPPER(:2)
  AND t.nested = 'NO'
  AND t.secondary = 'N'
ORDER BY t.table_name
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    c.table_name AS table_name,
    c.column_name AS column_name,
    CASE
        WHEN c.data_type IN ('VARCHAR2', 'NVARCHAR2', 'CHAR', 'NCHAR')
            THEN LOWER(c.data_type) || '(' || c.char_length || ')'
        WHEN c.data_type = 'RAW'
            THEN 'raw(' || c.data_length || ')'
        WHEN c.data_type = 'NUMBER' AND c.data_precision IS NOT NULL
            THEN 'number(' || c.data_precision || ',' || NVL(c.data_scale, 0) || ')'
        ELSE LOWER(c.data_type)
    END AS data_type,
    TRIM(c.data_default_vc) AS column_default,
    CASE WHEN c.nullable = 'Y' THEN 1 ELSE 0 END AS is_nullable,
    CASE WHEN EXISTS (
        SELECT 1 FROM all_constraints k
        JOIN all_cons_columns kc ON kc.owner = k.owner AND kc.constraint_name = k.constraint_name
        WHERE k.constraint_type = 'P' AND k.owner = c.owner AND k.table_name = c.table_name
          AND kc.column_name = c.column_name
    ) THEN 1 ELSE 0 END AS is_primary_key,
    CASE WHEN EXISTS (
        SELECT 1 FROM all_constraints k
        JOIN all_cons_columns kc ON kc.owner = k.owner AND kc.constraint_name = k.constraint_name
        WHERE k.constraint_type = 'U' AND k.owner = c.owner AND k.table_name = c.table_name
          AND kc.column_name = c.column_name
          AND (SELECT COUNT(*) FROM all_cons_columns x
               WHERE x.owner = k.owner AND x.constraint_name = k.constraint_name) = 1
    ) THEN 1 ELSE 0 END AS is_unique,
    c.column_id AS ordinal_position,
    CASE WHEN ic.column_name IS NOT NULL THEN 1 ELSE 0 END AS is_auto_increment,
    ic.generation_type AS identity_generation,
    TO_NUMBER(REGEXP_SUBSTR(ic.identity_options, 'START WITH: (-?[0-9]+)', 1, 1, NULL, 1)) AS identity_start,
    TO_NUMBER(REGEXP_SUBSTR(ic.identity_options, 'INCREMENT BY: (-?[0-9]+)', 1, 1, NULL, 1)) AS identity_increment,
    CASE WHEN ic.identity_options LIKE '%CYCLE_FLAG: Y%' THEN 1 ELSE 0 END AS identity_cycle,
    NULL AS auto_increment_start
FROM all_tab_columns c
JOIN all_tables t ON t.owner = c.owner AND t.table_name = c.table_name
LEFT JOIN all_tab_identity_cols ic
    ON ic.owner = c.owner AND ic.table_name = c.table_name AND ic.column_name = c.column_name
WHERE c.owner = COALESCE(:1, {schema})
  AND c.table_name <> UPPER(:2)
ORDER BY c.table_name, c.column_id
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    k.constraint_name AS constraint_name,
    k.table_name AS table_name,
    kc.column_name AS column_name,
    rk.table_name AS referenced_table,
    rc.column_name AS referenced_column,
    kc.position AS ordinal_position,
    k.delete_rule AS delete_rule,
    NULL AS update_rule,
    CASE WHEN k.deferrable = 'DEFERRABLE' THEN 1 ELSE 0 END AS is_deferrable,
    CASE WHEN k.deferred = 'DEFERRED' THEN 1 ELSE 0 END AS initially_deferred
FROM all_constraints k
JOIN all_cons_columns kc ON kc.owner = k.owner AND kc.constraint_name = k.constraint_name
JOIN all_constraints rk ON rk.owner = k.r_owner AND rk.constraint_name = k.r_constraint_name
JOIN all_cons_columns rc
    ON rc.owner = rk.owner AND rc.constraint_name = rk.constraint_name AND rc.position = kc.position
WHERE k.constraint_type = 'R'
  AND k.owner = COALESCE(:1, {schema})
  AND k.table_name <> UPPER(:2)
ORDER BY k.constraint_name, kc.position
"#;

// all_sequences has no start value; the next value to hand out stands in for it
const SEQUENCES_SQL: &str = r#"
SELECT
    s.sequence_name AS sequence_name,
    NULL AS data_type,
    s.last_number AS start_value,
    s.min_value AS min_value,
    CASE WHEN s.max_value > 9223372036854775807 THEN NULL ELSE s.max_value END AS max_value,
    s.increment_by AS increment_by,
    CASE WHEN s.cycle_flag = 'Y' THEN 1 ELSE 0 END AS cycle,
    NULLIF(s.cache_size, 0) AS cache_size,
    ic.table_name AS owned_by_table,
    ic.column_name AS owned_by_column
FROM all_sequences s
LEFT JOIN all_tab_identity_cols ic
    ON ic.owner = s.sequence_owner AND ic.sequence_name = s.sequence_name
WHERE s.sequence_owner = COALESCE(:1, {schema})
  AND s.sequence_name <> UPPER(:2)
ORDER BY s.sequence_name
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleIntrospector;

impl OracleIntrospector {
    pub fn new() -> Self {
        Self
    }
}

fn scoped(sql: &str) -> String {
    sql.replace("{schema}", CURRENT_SCHEMA)
}

impl Introspector for OracleIntrospector {
    fn dialect_name(&self) -> &'static str {
        "oracle"
    }

    fn table_list_sql(&self) -> String {
        scoped(TABLES_SQL)
    }

    fn column_details_sql(&self) -> String {
        scoped(COLUMNS_SQL)
    }

    fn constraint_details_sql(&self) -> String {
        scoped(CONSTRAINTS_SQL)
    }

    fn sequence_details_sql(&self) -> Option<String> {
        Some(scoped(SEQUENCES_SQL))
    }

    fn foreign_key_action(&self, code: &str) -> Option<ForeignKeyAction> {
        ForeignKeyAction::from_rule(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;
    use crate::introspect::{ConstraintDetail, SequenceDetail};

    #[test]
    fn test_queries_default_to_current_schema() {
        let introspector = OracleIntrospector::new();
        let sql = introspector.column_details_sql();
        assert!(sql.contains("COALESCE(:1, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))"));
        assert!(!sql.contains("{schema}"));
        assert!(introspector
            .sequence_details_sql()
            .unwrap()
            .contains("all_tab_identity_cols"));
    }

    #[test]
    fn test_identity_sequences_are_owned() {
        let sequence = SequenceDetail {
            name: "ISEQ$$_74123".to_string(),
            owned_by: Some(("ORDERS".to_string(), "ID".to_string())),
            ..Default::default()
        };
        assert!(sequence.is_owned_by("orders", "id"));
        assert!(!sequence.is_owned_by("ORDERS", "CODE"));
    }

    #[test]
    fn test_foreign_key_rules() {
        let introspector = OracleIntrospector::new();
        let detail = ConstraintDetail {
            constraint_name: "FK_LINES_ORDER".to_string(),
            table_name: "ORDER_LINES".to_string(),
            column_name: "ORDER_ID".to_string(),
            referenced_table: "ORDERS".to_string(),
            referenced_column: "ID".to_string(),
            ordinal: 1,
            delete_rule: Some("CASCADE".to_string()),
            update_rule: None,
            deferrable: true,
            initially_deferred: false,
        };

        let changes = introspector.generate_foreign_key_changes(&[detail]);
        let Change::AddForeignKey(fk) = &changes[0] else {
            panic!("Expected AddForeignKey");
        };
        assert_eq!(fk.on_delete, Some(ForeignKeyAction::Cascade));
        assert_eq!(fk.on_update, None);
        assert!(fk.deferrable && !fk.initially_deferred);
    }
}
