//! PostgreSQL catalog reader
//!
//! Reads `pg_catalog` directly so identity columns, serial ownership and
//! referential action codes are available without guessing from
//! `information_schema`.

use super::Introspector;
use crate::change::ForeignKeyAction;

const TABLES_SQL: &str = r#"
SELECT c.relname::text AS table_name
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p')
  AND n.nspname = COALESCE($1, current_schema())
  AND c.relname <> $2
ORDER BY c.relname
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    c.relname::text AS table_name,
    a.attname::text AS column_name,
    pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
    pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default,
    NOT a.attnotnull AS is_nullable,
    EXISTS (
        SELECT 1 FROM pg_catalog.pg_constraint pk
        WHERE pk.conrelid = c.oid AND pk.contype = 'p' AND a.attnum = ANY(pk.conkey)
    ) AS is_primary_key,
    EXISTS (
        SELECT 1 FROM pg_catalog.pg_constraint uq
        WHERE uq.conrelid = c.oid AND uq.contype = 'u' AND uq.conkey = ARRAY[a.attnum]
    ) AS is_unique,
    a.attnum::int4 AS ordinal_position,
    a.attidentity IN ('a', 'd') AS is_auto_increment,
    NULLIF(a.attidentity::text, '') AS identity_generation,
    s.seqstart AS identity_start,
    s.seqincrement AS identity_increment,
    s.seqcycle AS identity_cycle,
    NULL::int8 AS auto_increment_start
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
LEFT JOIN pg_catalog.pg_sequence s
    ON a.attidentity IN ('a', 'd')
   AND s.seqrelid = pg_catalog.pg_get_serial_sequence(
        quote_ident(n.nspname) || '.' || quote_ident(c.relname), a.attname)::regclass
WHERE c.relkind IN ('r', 'p')
  AND a.attnum > 0
  AND NOT a.attisdropped
  AND n.nspname = COALESCE($1, current_schema())
  AND c.relname <> $2
ORDER BY c.relname, a.attnum
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
    con.conname::text AS constraint_name,
    t.relname::text AS table_name,
    a.attname::text AS column_name,
    rt.relname::text AS referenced_table,
    ra.attname::text AS referenced_column,
    k.ord AS ordinal_position,
    con.confdeltype::text AS delete_rule,
    con.confupdtype::text AS update_rule,
    con.condeferrable AS is_deferrable,
    con.condeferred AS initially_deferred
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_class rt ON rt.oid = con.confrelid
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refattnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refattnum
WHERE con.contype = 'f'
  AND n.nspname = COALESCE($1, current_schema())
  AND t.relname <> $2
ORDER BY con.conname, k.ord
"#;

// Ownership comes from pg_depend: 'a' for OWNED BY (serial), 'i' for identity
const SEQUENCES_SQL: &str = r#"
SELECT
    s.sequencename::text AS sequence_name,
    s.data_type::text AS data_type,
    s.start_value,
    s.min_value,
    s.max_value,
    s.increment_by,
    s.cycle,
    s.cache_size,
    ot.relname::text AS owned_by_table,
    oa.attname::text AS owned_by_column
FROM pg_catalog.pg_sequences s
JOIN pg_catalog.pg_namespace n ON n.nspname = s.schemaname
JOIN pg_catalog.pg_class sc ON sc.relnamespace = n.oid AND sc.relname = s.sequencename
LEFT JOIN pg_catalog.pg_depend d
    ON d.objid = sc.oid
   AND d.classid = 'pg_catalog.pg_class'::regclass
   AND d.refclassid = 'pg_catalog.pg_class'::regclass
   AND d.deptype IN ('a', 'i')
LEFT JOIN pg_catalog.pg_class ot ON ot.oid = d.refobjid
LEFT JOIN pg_catalog.pg_attribute oa ON oa.attrelid = d.refobjid AND oa.attnum = d.refobjsubid
WHERE s.schemaname = COALESCE($1, current_schema())
  AND s.sequencename <> $2
ORDER BY s.sequencename
"#;

// Primary keys, exclusion constraints and single-column unique constraints
// are already carried by the column definitions
const INDEXES_SQL: &str = r#"
SELECT
    i.relname::text AS index_name,
    t.relname::text AS table_name,
    a.attname::text AS column_name,
    k.ord AS ordinal_position,
    ix.indisunique AS is_unique
FROM pg_catalog.pg_index ix
JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = COALESCE($1, current_schema())
  AND t.relname <> $2
  AND NOT EXISTS (
      SELECT 1 FROM pg_catalog.pg_constraint con
      WHERE con.conindid = ix.indexrelid
        AND (con.contype IN ('p', 'x') OR (con.contype = 'u' AND array_length(con.conkey, 1) = 1))
  )
ORDER BY i.relname, k.ord
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresIntrospector;

impl PostgresIntrospector {
    pub fn new() -> Self {
        Self
    }
}

impl Introspector for PostgresIntrospector {
    fn dialect_name(&self) -> &'static str {
        "postgresql"
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

    fn index_details_sql(&self) -> Option<String> {
        Some(INDEXES_SQL.to_string())
    }

    fn foreign_key_action(&self, code: &str) -> Option<ForeignKeyAction> {
        ForeignKeyAction::from_postgres_code(code)
    }
}
