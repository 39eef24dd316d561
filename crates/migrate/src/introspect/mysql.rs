//! MySQL and MariaDB catalog reader
//!
//! Names are cast to `CHAR(255)` to avoid collation mismatches between
//! information_schema views. MySQL reports string defaults unquoted while
//! MariaDB quotes them, so the default expression differs per flavor.

use super::Introspector;
use crate::change::ForeignKeyAction;
use crate::ddl::MySqlFlavor;

const TABLES_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR(255)) AS table_name
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
  AND TABLE_TYPE = 'BASE TABLE'
  AND TABLE_NAME <> ?
ORDER BY TABLE_NAME
"#;

const MYSQL_DEFAULT: &str = r#"CASE
        WHEN c.COLUMN_DEFAULT IS NULL THEN NULL
        WHEN c.EXTRA LIKE '%DEFAULT_GENERATED%' THEN c.COLUMN_DEFAULT
        WHEN c.DATA_TYPE IN ('char', 'varchar', 'tinytext', 'text', 'mediumtext', 'longtext',
                             'enum', 'set', 'binary', 'varbinary', 'date', 'datetime',
                             'timestamp', 'time', 'year')
            THEN CONCAT('''', REPLACE(c.COLUMN_DEFAULT, '''', ''''''), '''')
        ELSE c.COLUMN_DEFAULT
    END"#;

const MARIADB_DEFAULT: &str = "NULLIF(c.COLUMN_DEFAULT, 'NULL')";

const CONSTRAINTS_SQL: &str = r#"
SELECT
    CAST(rc.CONSTRAINT_NAME AS CHAR(255)) AS constraint_name,
    CAST(k.TABLE_NAME AS CHAR(255)) AS table_name,
    CAST(k.COLUMN_NAME AS CHAR(255)) AS column_name,
    CAST(k.REFERENCED_TABLE_NAME AS CHAR(255)) AS referenced_table,
    CAST(k.REFERENCED_COLUMN_NAME AS CHAR(255)) AS referenced_column,
    k.ORDINAL_POSITION AS ordinal_position,
    CAST(rc.DELETE_RULE AS CHAR(32)) AS delete_rule,
    CAST(rc.UPDATE_RULE AS CHAR(32)) AS update_rule,
    0 AS is_deferrable,
    0 AS initially_deferred
FROM information_schema.REFERENTIAL_CONSTRAINTS rc
JOIN information_schema.KEY_COLUMN_USAGE k
    ON k.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA
   AND k.CONSTRAINT_NAME = rc.CONSTRAINT_NAME
   AND k.TABLE_NAME = rc.TABLE_NAME
WHERE rc.CONSTRAINT_SCHEMA = COALESCE(?, DATABASE())
  AND rc.TABLE_NAME <> ?
ORDER BY rc.CONSTRAINT_NAME, k.ORDINAL_POSITION
"#;

// MariaDB lists sequences as tables; their options are only visible through
// SHOW CREATE SEQUENCE, so just the names are read
const MARIADB_SEQUENCES_SQL: &str = r#"
SELECT
    CAST(TABLE_NAME AS CHAR(255)) AS sequence_name,
    NULL AS data_type,
    NULL AS start_value,
    NULL AS min_value,
    NULL AS max_value,
    NULL AS increment_by,
    0 AS cycle,
    NULL AS cache_size,
    NULL AS owned_by_table,
    NULL AS owned_by_column
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
  AND TABLE_TYPE = 'SEQUENCE'
  AND TABLE_NAME <> ?
ORDER BY TABLE_NAME
"#;

// Single-column unique indexes show up as UNI column keys and foreign key
// backing indexes come with the constraint, so both are skipped
const INDEXES_SQL: &str = r#"
SELECT
    CAST(s.INDEX_NAME AS CHAR(255)) AS index_name,
    CAST(s.TABLE_NAME AS CHAR(255)) AS table_name,
    CAST(s.COLUMN_NAME AS CHAR(255)) AS column_name,
    s.SEQ_IN_INDEX AS ordinal_position,
    s.NON_UNIQUE = 0 AS is_unique
FROM information_schema.STATISTICS s
WHERE s.TABLE_SCHEMA = COALESCE(?, DATABASE())
  AND s.TABLE_NAME <> ?
  AND s.INDEX_NAME <> 'PRIMARY'
  AND s.COLUMN_NAME IS NOT NULL
  AND NOT (
      s.NON_UNIQUE = 0 AND (
          SELECT COUNT(*) FROM information_schema.STATISTICS s2
          WHERE s2.TABLE_SCHEMA = s.TABLE_SCHEMA
            AND s2.TABLE_NAME = s.TABLE_NAME
            AND s2.INDEX_NAME = s.INDEX_NAME
      ) = 1
  )
  AND NOT EXISTS (
      SELECT 1 FROM information_schema.TABLE_CONSTRAINTS tc
      WHERE tc.CONSTRAINT_SCHEMA = s.TABLE_SCHEMA
        AND tc.TABLE_NAME = s.TABLE_NAME
        AND tc.CONSTRAINT_NAME = s.INDEX_NAME
        AND tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
  )
ORDER BY s.INDEX_NAME, s.SEQ_IN_INDEX
"#;

#[derive(Debug, Clone, Copy)]
pub struct MySqlIntrospector {
    flavor: MySqlFlavor,
}

impl MySqlIntrospector {
    pub fn new(flavor: MySqlFlavor) -> Self {
        Self { flavor }
    }

    pub fn mysql() -> Self {
        Self::new(MySqlFlavor::MySql)
    }

    pub fn mariadb() -> Self {
        Self::new(MySqlFlavor::MariaDb)
    }

    pub fn flavor(&self) -> MySqlFlavor {
        self.flavor
    }

    fn default_expression(&self) -> &'static str {
        match self.flavor {
            MySqlFlavor::MySql => MYSQL_DEFAULT,
            MySqlFlavor::MariaDb => MARIADB_DEFAULT,
        }
    }
}

impl Introspector for MySqlIntrospector {
    fn dialect_name(&self) -> &'static str {
        match self.flavor {
            MySqlFlavor::MySql => "mysql",
            MySqlFlavor::MariaDb => "mariadb",
        }
    }

    fn table_list_sql(&self) -> String {
        TABLES_SQL.to_string()
    }

    fn column_details_sql(&self) -> String {
        format!(
            r#"
SELECT
    CAST(c.TABLE_NAME AS CHAR(255)) AS table_name,
    CAST(c.COLUMN_NAME AS CHAR(255)) AS column_name,
    CAST(c.COLUMN_TYPE AS CHAR(255)) AS data_type,
    CAST({default} AS CHAR(1024)) AS column_default,
    c.IS_NULLABLE = 'YES' AS is_nullable,
    c.COLUMN_KEY = 'PRI' AS is_primary_key,
    c.COLUMN_KEY = 'UNI' AS is_unique,
    c.ORDINAL_POSITION AS ordinal_position,
    IF(c.EXTRA LIKE '%auto_increment%', 1, 0) AS is_auto_increment,
    NULL AS identity_generation,
    NULL AS identity_start,
    NULL AS identity_increment,
    0 AS identity_cycle,
    IF(c.EXTRA LIKE '%auto_increment%', t.AUTO_INCREMENT, NULL) AS auto_increment_start
FROM information_schema.COLUMNS c
JOIN information_schema.TABLES t
    ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
WHERE c.TABLE_SCHEMA = COALESCE(?, DATABASE())
  AND t.TABLE_TYPE = 'BASE TABLE'
  AND c.TABLE_NAME <> ?
ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#,
            default = self.default_expression()
        )
    }

    fn constraint_details_sql(&self) -> String {
        CONSTRAINTS_SQL.to_string()
    }

    fn sequence_details_sql(&self) -> Option<String> {
        match self.flavor {
            MySqlFlavor::MySql => None,
            MySqlFlavor::MariaDb => Some(MARIADB_SEQUENCES_SQL.to_string()),
        }
    }

    fn index_details_sql(&self) -> Option<String> {
        Some(INDEXES_SQL.to_string())
    }

    fn foreign_key_action(&self, code: &str) -> Option<ForeignKeyAction> {
        ForeignKeyAction::from_rule(code)
    }
}
