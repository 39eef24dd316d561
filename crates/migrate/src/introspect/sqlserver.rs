//! SQL Server catalog reader over the `sys` views

use super::Introspector;
use crate::change::ForeignKeyAction;

const TABLES_SQL: &str = r#"
SELECT t.name AS table_name
FROM sys.tables t
WHERE SCHEMA_NAME(t.schema_id) = COALESCE(@P1, SCHEMA_NAME())
  AND t.name <> @P2
ORDER BY t.name
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    t.name AS table_name,
    c.name AS column_name,
    CASE
        WHEN ty.name IN ('varchar', 'char', 'varbinary', 'binary')
            THEN ty.name + '(' + CASE WHEN c.max_length = -1 THEN 'max' ELSE CAST(c.max_length AS varchar(10)) END + ')'
        WHEN ty.name IN ('nvarchar', 'nchar')
            THEN ty.name + '(' + CASE WHEN c.max_length = -1 THEN 'max' ELSE CAST(c.max_length / 2 AS varchar(10)) END + ')'
        WHEN ty.name IN ('decimal', 'numeric')
            THEN ty.name + '(' + CAST(c.precision AS varchar(10)) + ',' + CAST(c.scale AS varchar(10)) + ')'
        ELSE ty.name
    END AS data_type,
    dc.definition AS column_default,
    CAST(c.is_nullable AS int) AS is_nullable,
    CASE WHEN EXISTS (
        SELECT 1 FROM sys.indexes i
        JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
        WHERE i.is_primary_key = 1 AND ic.object_id = c.object_id AND ic.column_id = c.column_id
    ) THEN 1 ELSE 0 END AS is_primary_key,
    CASE WHEN EXISTS (
        SELECT 1 FROM sys.indexes i
        JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
        WHERE i.is_unique_constraint = 1 AND ic.object_id = c.object_id AND ic.column_id = c.column_id
          AND (SELECT COUNT(*) FROM sys.index_columns ic2
               WHERE ic2.object_id = i.object_id AND ic2.index_id = i.index_id) = 1
    ) THEN 1 ELSE 0 END AS is_unique,
    c.column_id AS ordinal_position,
    CAST(c.is_identity AS int) AS is_auto_increment,
    CASE WHEN c.is_identity = 1 THEN 'BY DEFAULT' END AS identity_generation,
    CAST(idc.seed_value AS bigint) AS identity_start,
    CAST(idc.increment_value AS bigint) AS identity_increment,
    0 AS identity_cycle,
    NULL AS auto_increment_start
FROM sys.columns c
JOIN sys.tables t ON t.object_id = c.object_id
JOIN sys.types ty ON ty.user_type_id = c.user_type_id
LEFT JOIN sys.default_constraints dc ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
LEFT JOIN sys.identity_columns idc ON idc.object_id = c.object_id AND idc.column_id = c.column_id
WHERE SCHEMA_NAME(t.schema_id) = COALESCE(@P1, SCHEMA_NAME())
  AND t.name <> @P2
ORDER BY t.name, c.column_id
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    fk.name AS constraint_name,
    t.name AS table_name,
    c.name AS column_name,
    rt.name AS referenced_table,
    rc.name AS referenced_column,
    fkc.constraint_column_id AS ordinal_position,
    CAST(fk.delete_referential_action AS varchar(2)) AS delete_rule,
    CAST(fk.update_referential_action AS varchar(2)) AS update_rule,
    0 AS is_deferrable,
    0 AS initially_deferred
FROM sys.foreign_keys fk
JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
JOIN sys.tables t ON t.object_id = fk.parent_object_id
JOIN sys.columns c ON c.object_id = fkc.parent_object_id AND c.column_id = fkc.parent_column_id
JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
WHERE SCHEMA_NAME(t.schema_id) = COALESCE(@P1, SCHEMA_NAME())
  AND t.name <> @P2
ORDER BY fk.name, fkc.constraint_column_id
"#;

const SEQUENCES_SQL: &str = r#"
SELECT
    s.name AS sequence_name,
    TYPE_NAME(s.user_type_id) AS data_type,
    CAST(s.start_value AS bigint) AS start_value,
    CAST(s.minimum_value AS bigint) AS min_value,
    CAST(s.maximum_value AS bigint) AS max_value,
    CAST(s.increment AS bigint) AS increment_by,
    CAST(s.is_cycling AS int) AS cycle,
    s.cache_size AS cache_size,
    NULL AS owned_by_table,
    NULL AS owned_by_column
FROM sys.sequences s
WHERE SCHEMA_NAME(s.schema_id) = COALESCE(@P1, SCHEMA_NAME())
  AND s.name <> @P2
ORDER BY s.name
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerIntrospector;

impl SqlServerIntrospector {
    pub fn new() -> Self {
        Self
    }
}

/// `((0))` and `('draft')` as stored in `sys.default_constraints`
fn strip_outer_parens(mut default: &str) -> &str {
    loop {
        let trimmed = default.trim();
        match trimmed.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            Some(inner) if is_balanced(inner) => default = inner,
            _ => return trimmed,
        }
    }
}

fn is_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    for ch in text.chars() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

impl Introspector for SqlServerIntrospector {
    fn dialect_name(&self) -> &'static str {
        "sqlserver"
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
        ForeignKeyAction::from_sqlserver_code(code)
    }

    fn normalize_default(&self, default: String) -> Option<String> {
        Some(strip_outer_parens(&default).to_string())
    }
}
