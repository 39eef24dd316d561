//! Schema Introspection
//!
//! Reads a live database catalog and turns it into the `Change` list that
//! would recreate it. Each dialect only supplies its catalog SQL and the
//! encoding of referential actions; grouping, sequence ownership inference
//! and dependency ordering are shared.

pub mod h2;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sort;
pub mod sqlserver;
pub mod synthesis;

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backends::{DatabasePool, DatabaseRow, DatabaseValue};
use crate::change::{Change, CreateSequence, ForeignKeyAction, IdentityGeneration};
use crate::config::MigrationConfig;
use crate::error::MigrateResult;

pub use h2::H2Introspector;
pub use mysql::MySqlIntrospector;
pub use oracle::OracleIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlserver::SqlServerIntrospector;

/// Which schema to read and which bookkeeping objects to leave out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogScope {
    /// `None` reads the connection's current schema
    pub schema: Option<String>,
    pub history_table: String,
    pub history_sequence: String,
}

impl CatalogScope {
    pub fn new(history_table: impl Into<String>) -> Self {
        let history_table = history_table.into();
        Self {
            schema: None,
            history_sequence: format!("{}_id_seq", history_table),
            history_table,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    fn table_params(&self) -> [DatabaseValue; 2] {
        [self.schema.clone().into(), self.history_table.as_str().into()]
    }

    fn sequence_params(&self) -> [DatabaseValue; 2] {
        [self.schema.clone().into(), self.history_sequence.as_str().into()]
    }
}

impl From<&MigrationConfig> for CatalogScope {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            history_table: config.history_table.clone(),
            history_sequence: config.history_sequence(),
        }
    }
}

/// One column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDetail {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub default_value: Option<String>,
    pub nullable: bool,
    pub primary_key: bool,
    /// Backed by a single-column unique constraint
    pub unique: bool,
    pub ordinal: i64,
    /// Values come from the database (identity or `AUTO_INCREMENT`)
    pub auto_increment: bool,
    pub identity_generation: Option<IdentityGeneration>,
    pub identity_start: Option<i64>,
    pub identity_increment: Option<i64>,
    pub identity_cycle: bool,
    /// MySQL's next `AUTO_INCREMENT` value for the table
    pub auto_increment_start: Option<i64>,
}

impl ColumnDetail {
    pub fn from_row(row: &DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            table_name: row.get_string("table_name")?,
            column_name: row.get_string("column_name")?,
            data_type: row.get_string("data_type")?,
            default_value: row.get_optional_string("column_default")?,
            nullable: row.get_optional_bool("is_nullable")?,
            primary_key: row.get_optional_bool("is_primary_key")?,
            unique: row.get_optional_bool("is_unique")?,
            ordinal: row.get_i64("ordinal_position")?,
            auto_increment: row.get_optional_bool("is_auto_increment")?,
            identity_generation: row
                .get_optional_string("identity_generation")?
                .as_deref()
                .and_then(IdentityGeneration::from_catalog),
            identity_start: row.get_optional_i64("identity_start")?,
            identity_increment: row.get_optional_i64("identity_increment")?,
            identity_cycle: row.get_optional_bool("identity_cycle")?,
            auto_increment_start: row.get_optional_i64("auto_increment_start")?,
        })
    }
}

/// One column pair of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDetail {
    pub constraint_name: String,
    pub table_name: String,
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
    /// Position of the column within the key, starting at 1
    pub ordinal: i64,
    /// Raw catalog encoding, translated by [`Introspector::foreign_key_action`]
    pub delete_rule: Option<String>,
    pub update_rule: Option<String>,
    pub deferrable: bool,
    pub initially_deferred: bool,
}

impl ConstraintDetail {
    pub fn from_row(row: &DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            constraint_name: row.get_string("constraint_name")?,
            table_name: row.get_string("table_name")?,
            column_name: row.get_string("column_name")?,
            referenced_table: row.get_string("referenced_table")?,
            referenced_column: row.get_string("referenced_column")?,
            ordinal: row.get_i64("ordinal_position")?,
            delete_rule: row.get_optional_string("delete_rule")?,
            update_rule: row.get_optional_string("update_rule")?,
            deferrable: row.get_optional_bool("is_deferrable")?,
            initially_deferred: row.get_optional_bool("initially_deferred")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceDetail {
    pub name: String,
    pub data_type: Option<String>,
    pub start: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub increment_by: Option<i64>,
    pub cycle: bool,
    pub cache_size: Option<i64>,
    /// Table and column the sequence is owned by (serial or identity)
    pub owned_by: Option<(String, String)>,
}

impl SequenceDetail {
    pub fn from_row(row: &DatabaseRow) -> MigrateResult<Self> {
        let owned_by = match (
            row.get_optional_string("owned_by_table")?,
            row.get_optional_string("owned_by_column")?,
        ) {
            (Some(table), Some(column)) => Some((table, column)),
            _ => None,
        };

        Ok(Self {
            name: row.get_string("sequence_name")?,
            data_type: row.get_optional_string("data_type")?,
            start: row.get_optional_i64("start_value")?,
            min: row.get_optional_i64("min_value")?,
            max: row.get_optional_i64("max_value")?,
            increment_by: row.get_optional_i64("increment_by")?,
            cycle: row.get_optional_bool("cycle")?,
            cache_size: row.get_optional_i64("cache_size")?,
            owned_by,
        })
    }

    pub fn is_owned_by(&self, table: &str, column: &str) -> bool {
        match &self.owned_by {
            Some((owner_table, owner_column)) => {
                owner_table.eq_ignore_ascii_case(table) && owner_column.eq_ignore_ascii_case(column)
            }
            None => false,
        }
    }

    pub fn to_change(&self) -> CreateSequence {
        CreateSequence {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            start: self.start,
            min: self.min,
            max: self.max,
            increment_by: self.increment_by,
            cycle: self.cycle,
            cache_size: self.cache_size,
        }
    }
}

/// One column of a non-constraint index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDetail {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
    pub ordinal: i64,
    pub unique: bool,
}

impl IndexDetail {
    pub fn from_row(row: &DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            index_name: row.get_string("index_name")?,
            table_name: row.get_string("table_name")?,
            column_name: row.get_string("column_name")?,
            ordinal: row.get_i64("ordinal_position")?,
            unique: row.get_optional_bool("is_unique")?,
        })
    }
}

/// Catalog reader for one dialect.
///
/// Every catalog query takes two bind parameters: the schema (null for the
/// current one) and the name of the object to exclude (the history table, or
/// its sequence for the sequence query).
#[async_trait]
pub trait Introspector: Send + Sync + Debug {
    fn dialect_name(&self) -> &'static str;

    /// Base tables, aliased `table_name`
    fn table_list_sql(&self) -> String;

    /// Columns of every base table ordered by table and position, with the
    /// aliases read by [`ColumnDetail::from_row`]
    fn column_details_sql(&self) -> String;

    /// Foreign key column pairs ordered by constraint and position
    fn constraint_details_sql(&self) -> String;

    /// `None` when the dialect has no sequences
    fn sequence_details_sql(&self) -> Option<String>;

    fn index_details_sql(&self) -> Option<String> {
        None
    }

    /// Translate the catalog's referential action encoding
    fn foreign_key_action(&self, code: &str) -> Option<ForeignKeyAction>;

    /// Clean up a default expression as the catalog stores it
    fn normalize_default(&self, default: String) -> Option<String> {
        Some(default)
    }

    async fn get_table_list(&self, pool: &dyn DatabasePool, scope: &CatalogScope) -> MigrateResult<Vec<String>> {
        let rows = pool.fetch_all(&self.table_list_sql(), &scope.table_params()).await?;
        rows.iter().map(|row| row.get_string("table_name")).collect()
    }

    async fn get_column_details(
        &self,
        pool: &dyn DatabasePool,
        scope: &CatalogScope,
    ) -> MigrateResult<Vec<ColumnDetail>> {
        let rows = pool.fetch_all(&self.column_details_sql(), &scope.table_params()).await?;
        rows.iter()
            .map(|row| {
                let mut detail = ColumnDetail::from_row(row)?;
                detail.default_value = detail.default_value.take().and_then(|d| self.normalize_default(d));
                Ok(detail)
            })
            .collect()
    }

    async fn get_constraint_details(
        &self,
        pool: &dyn DatabasePool,
        scope: &CatalogScope,
    ) -> MigrateResult<Vec<ConstraintDetail>> {
        let rows = pool
            .fetch_all(&self.constraint_details_sql(), &scope.table_params())
            .await?;
        rows.iter().map(ConstraintDetail::from_row).collect()
    }

    async fn get_sequence_details(
        &self,
        pool: &dyn DatabasePool,
        scope: &CatalogScope,
    ) -> MigrateResult<Vec<SequenceDetail>> {
        let Some(sql) = self.sequence_details_sql() else {
            return Ok(Vec::new());
        };
        let rows = pool.fetch_all(&sql, &scope.sequence_params()).await?;
        rows.iter().map(SequenceDetail::from_row).collect()
    }

    async fn get_index_details(
        &self,
        pool: &dyn DatabasePool,
        scope: &CatalogScope,
    ) -> MigrateResult<Vec<IndexDetail>> {
        let Some(sql) = self.index_details_sql() else {
            return Ok(Vec::new());
        };
        let rows = pool.fetch_all(&sql, &scope.table_params()).await?;
        rows.iter().map(IndexDetail::from_row).collect()
    }

    fn generate_changes_from_columns(
        &self,
        table: &str,
        columns: &[ColumnDetail],
        sequences: &[SequenceDetail],
    ) -> Vec<Change> {
        synthesis::changes_from_columns(table, columns, sequences)
    }

    fn generate_foreign_key_changes(&self, constraints: &[ConstraintDetail]) -> Vec<Change> {
        synthesis::foreign_keys_from_constraints(constraints, |code| self.foreign_key_action(code))
    }

    fn generate_index_changes(&self, indexes: &[IndexDetail]) -> Vec<Change> {
        synthesis::indexes_from_details(indexes)
    }

    fn sort_changes_by_dependencies(&self, changes: Vec<Change>) -> MigrateResult<Vec<Change>> {
        sort::sort_changes_by_dependencies(changes)
    }

    /// Dependency sort for a captured schema, where a table drawing on a
    /// sequence owned by another table's column also follows that table
    fn sort_captured_changes(&self, changes: Vec<Change>, sequences: &[SequenceDetail]) -> MigrateResult<Vec<Change>> {
        let owners: BTreeMap<String, String> = sequences
            .iter()
            .filter_map(|sequence| {
                let (table, _) = sequence.owned_by.as_ref()?;
                Some((sequence.name.to_ascii_lowercase(), table.clone()))
            })
            .collect();
        sort::sort_with_sequence_owners(changes, &owners)
    }

    /// Read the whole schema and return it as an ordered change list
    async fn capture(&self, pool: &dyn DatabasePool, scope: &CatalogScope) -> MigrateResult<Vec<Change>> {
        let tables = self.get_table_list(pool, scope).await?;
        let columns = self.get_column_details(pool, scope).await?;
        let sequences = self.get_sequence_details(pool, scope).await?;
        let constraints = self.get_constraint_details(pool, scope).await?;
        let indexes = self.get_index_details(pool, scope).await?;
        debug!(
            "{} catalog: {} tables, {} columns, {} sequences, {} foreign key columns, {} index columns",
            self.dialect_name(),
            tables.len(),
            columns.len(),
            sequences.len(),
            constraints.len(),
            indexes.len()
        );

        let mut changes = Vec::new();
        let mut emitted_sequences = HashSet::new();

        for table in &tables {
            let table_columns: Vec<ColumnDetail> = columns
                .iter()
                .filter(|column| &column.table_name == table)
                .cloned()
                .collect();

            for change in self.generate_changes_from_columns(table, &table_columns, &sequences) {
                if let Change::CreateSequence(sequence) = &change {
                    if !emitted_sequences.insert(sequence.name.to_ascii_lowercase()) {
                        continue;
                    }
                }
                changes.push(change);
            }
        }

        for sequence in &sequences {
            if sequence.owned_by.is_none() && emitted_sequences.insert(sequence.name.to_ascii_lowercase()) {
                changes.push(sequence.to_change().into());
            }
        }

        changes.extend(self.generate_foreign_key_changes(&constraints));
        changes.extend(self.generate_index_changes(&indexes));

        let changes = self.sort_captured_changes(changes, &sequences)?;
        info!("Captured {} change(s) from {} schema", changes.len(), self.dialect_name());
        Ok(changes)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Pool answering catalog queries with canned rows

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::backends::*;
    use crate::error::{MigrateError, MigrateResult};

    #[derive(Clone, Default)]
    pub struct CatalogPool {
        /// (marker text in the SQL, rows to return)
        pub answers: Vec<(&'static str, Vec<DatabaseRow>)>,
        pub queries: Arc<Mutex<Vec<(String, Vec<DatabaseValue>)>>>,
    }

    impl CatalogPool {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn answer(mut self, marker: &'static str, rows: Vec<DatabaseRow>) -> Self {
            self.answers.push((marker, rows));
            self
        }

        pub fn queries(&self) -> Vec<(String, Vec<DatabaseValue>)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabasePool for CatalogPool {
        async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
            Err(MigrateError::Transaction("catalog pool is read-only".to_string()))
        }

        async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
            self.queries.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(self
                .answers
                .iter()
                .find(|(marker, _)| sql.contains(marker))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }

        async fn close(&self) {}

        fn metadata(&self) -> ConnectionMetadata {
            ConnectionMetadata::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CatalogPool;
    use super::*;

    #[test]
    fn test_scope_from_config() {
        let config = MigrationConfig::new().with_schema("app").with_history_table("log");
        let scope = CatalogScope::from(&config);
        assert_eq!(scope.schema.as_deref(), Some("app"));
        assert_eq!(scope.history_table, "log");
        assert_eq!(scope.history_sequence, "log_id_seq");
        assert_eq!(CatalogScope::new("log"), CatalogScope::from(&MigrationConfig::new().with_history_table("log")));
    }

    #[test]
    fn test_column_detail_from_row() {
        let row = DatabaseRow::from_pairs([
            ("TABLE_NAME", DatabaseValue::from("USERS")),
            ("COLUMN_NAME", "ID".into()),
            ("DATA_TYPE", "number(19,0)".into()),
            ("COLUMN_DEFAULT", DatabaseValue::Null),
            ("IS_NULLABLE", DatabaseValue::Int32(0)),
            ("IS_PRIMARY_KEY", DatabaseValue::Int32(1)),
            ("IS_UNIQUE", DatabaseValue::Int32(0)),
            ("ORDINAL_POSITION", DatabaseValue::Int64(1)),
            ("IS_AUTO_INCREMENT", DatabaseValue::Int32(1)),
            ("IDENTITY_GENERATION", "ALWAYS".into()),
            ("IDENTITY_START", "100".into()),
            ("IDENTITY_INCREMENT", DatabaseValue::Int64(5)),
            ("IDENTITY_CYCLE", DatabaseValue::Null),
            ("AUTO_INCREMENT_START", DatabaseValue::Null),
        ]);

        let detail = ColumnDetail::from_row(&row).unwrap();
        assert_eq!(detail.table_name, "USERS");
        assert!(detail.primary_key && !detail.nullable);
        assert_eq!(detail.identity_generation, Some(IdentityGeneration::Always));
        assert_eq!(detail.identity_start, Some(100));
        assert_eq!(detail.identity_increment, Some(5));
        assert!(!detail.identity_cycle);
    }

    #[tokio::test]
    async fn test_catalog_queries_bind_schema_and_excluded_names() {
        let pool = CatalogPool::new();
        let introspector = PostgresIntrospector::new();
        let scope = CatalogScope::new("change_set_history").with_schema("app");

        introspector.get_table_list(&pool, &scope).await.unwrap();
        introspector.get_sequence_details(&pool, &scope).await.unwrap();

        let queries = pool.queries();
        assert_eq!(
            queries[0].1,
            vec![DatabaseValue::from("app"), DatabaseValue::from("change_set_history")]
        );
        assert_eq!(
            queries[1].1,
            vec![DatabaseValue::from("app"), DatabaseValue::from("change_set_history_id_seq")]
        );
    }

    #[tokio::test]
    async fn test_missing_sequence_support_skips_query() {
        let pool = CatalogPool::new();
        let scope = CatalogScope::new("change_set_history");
        let sequences = MySqlIntrospector::mysql()
            .get_sequence_details(&pool, &scope)
            .await
            .unwrap();

        assert!(sequences.is_empty());
        assert!(pool.queries().is_empty());
    }
}
