//! Indexed Store - SQLite backend
//!
//! Records are flattened into one row of a single table whose columns come
//! from a prototype record (see [`TableSchema`]). Grouping and limiting run
//! inside SQLite instead of scanning rows in the application.
//!
//! Unlike the line store, `limit` here bounds the number of groups returned,
//! picking the groups with the most recently inserted rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::types::{Value as SqlValue, ValueRef};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::Value;

use super::schema::TableSchema;
use super::{Backend, RawRows, RecordStore, SelectQuery, Selection, StoreError, StoreResult};
use crate::aggregate::group_key;
use crate::types::{ColumnType, GroupCountResult, DEFAULT_SEPARATOR};

/// Default table name
pub const DEFAULT_TABLE: &str = "records";

/// Configuration for the IndexedStore
#[derive(Debug, Clone)]
pub struct IndexedStoreConfig {
    pub table: String,
    /// Separator joining path segments into column names
    pub separator: char,
    /// Column type overrides by flattened name
    pub column_types: BTreeMap<String, ColumnType>,
}

impl Default for IndexedStoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            separator: DEFAULT_SEPARATOR,
            column_types: BTreeMap::new(),
        }
    }
}

/// SQLite-backed record store
pub struct IndexedStore {
    file_path: PathBuf,
    /// Locked per statement so shared readers can query through `&self`
    conn: Mutex<Connection>,
    schema: TableSchema,
}

impl IndexedStore {
    /// Open the database at `path` and create the table if needed
    ///
    /// The schema and every statement are derived from `prototype` here,
    /// before any record is touched.
    pub fn open<P: AsRef<Path>>(
        path: P,
        prototype: &Value,
        config: IndexedStoreConfig,
    ) -> StoreResult<Self> {
        let file_path = path.as_ref().to_path_buf();
        let schema = TableSchema::from_prototype(
            &config.table,
            prototype,
            config.separator,
            &config.column_types,
        )?;

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&file_path)?;

        let store = Self {
            file_path,
            conn: Mutex::new(conn),
            schema,
        };
        store.init()?;

        tracing::info!(
            path = %store.file_path.display(),
            table = store.schema.table(),
            columns = store.schema.fields().len(),
            "opened indexed store"
        );
        Ok(store)
    }

    /// Create the table if it does not exist; safe to call repeatedly
    pub fn init(&self) -> StoreResult<()> {
        self.conn.lock().execute(self.schema.create_sql(), [])?;
        Ok(())
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Flatten `record` into bound values, one per schema field
    fn row_values(&self, record: &Value) -> StoreResult<Vec<SqlValue>> {
        self.schema
            .fields()
            .iter()
            .map(|field| {
                field
                    .path
                    .resolve(record)
                    .map(to_sql_value)
                    .map_err(StoreError::SchemaMismatch)
            })
            .collect()
    }
}

/// Convert a JSON leaf to the value bound for its column
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        // Same key text as the line store groups under
        Value::Bool(b) => SqlValue::Text(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Record has a container where the prototype had a leaf
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl RecordStore for IndexedStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn add_record(&mut self, record: &Value) -> StoreResult<()> {
        // Resolve every column first: a record missing any field inserts nothing
        let values = self.row_values(record)?;

        let tx = self.conn.get_mut().transaction()?;
        {
            let mut stmt = tx.prepare_cached(self.schema.insert_sql())?;
            stmt.execute(rusqlite::params_from_iter(values.iter()))?;
        }
        tx.commit()?;

        tracing::debug!(table = self.schema.table(), "inserted record");
        Ok(())
    }

    fn select_records(&self, query: &SelectQuery) -> StoreResult<Selection> {
        if let Some(raw) = &query.raw_query {
            return self.raw_query(raw).map(Selection::Rows);
        }

        // Counting without a group column is not pushed down
        let Some(group_by) = query.effective_group_by() else {
            return Ok(Selection::Counts(GroupCountResult::empty()));
        };

        let sql = self
            .schema
            .group_sql(group_by)
            .ok_or_else(|| StoreError::UnknownColumn(self.schema.column_for(group_by)))?;
        let limit = query
            .effective_limit()
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        let mut result = GroupCountResult::empty();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let mut rows = stmt.query([limit])?;
        while let Some(row) = rows.next()? {
            let key = group_key(&to_json_value(row.get_ref(0)?));
            let count: i64 = row.get(1)?;
            let count = count.max(0) as u64;
            *result.counts.entry(key).or_insert(0) += count;
            result.record_count += count;
        }

        if result.is_empty() {
            return Ok(Selection::Counts(GroupCountResult::empty()));
        }
        result.grouped_key_count = result.counts.len() as u64;
        result.grouped_by = Some(group_by.to_string());

        tracing::debug!(
            group_by,
            limit,
            groups = result.grouped_key_count,
            "grouped indexed records"
        );
        Ok(Selection::Counts(result))
    }

    /// Execute arbitrary SQL and return its rows. Callers are trusted.
    fn raw_query(&self, query: &str) -> StoreResult<RawRows> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(query)?;
        let column_count = stmt.column_count();
        let rows = stmt.query_map([], |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(to_json_value))
                .collect::<Result<Vec<Value>, _>>()
        })?;
        Ok(rows.collect::<Result<RawRows, _>>()?)
    }

    fn export_snapshot(&self) -> StoreResult<Vec<u8>> {
        Ok(std::fs::read(&self.file_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store(prototype: Value) -> (IndexedStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexedStore::open(
            temp_dir.path().join("metrics.db"),
            &prototype,
            IndexedStoreConfig::default(),
        )
        .unwrap();
        (store, temp_dir)
    }

    fn counts(store: &IndexedStore, query: SelectQuery) -> GroupCountResult {
        store.select_records(&query).unwrap().into_counts().unwrap()
    }

    fn row_count(store: &IndexedStore) -> i64 {
        let rows = store.raw_query("SELECT COUNT(*) FROM records").unwrap();
        rows[0][0].as_i64().unwrap()
    }

    #[test]
    fn test_init_is_idempotent() {
        let (store, _temp_dir) = create_test_store(json!({"user": ""}));
        store.init().unwrap();
        store.init().unwrap();

        let tables = store
            .raw_query("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'records'")
            .unwrap();
        assert_eq!(tables, vec![vec![json!(1)]]);
    }

    #[test]
    fn test_insert_and_group() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": "", "os": {"name": ""}}));
        for (user, os) in [("alice", "linux"), ("bob", "mac"), ("alice", "linux")] {
            store
                .add_record(&json!({"user": user, "os": {"name": os}}))
                .unwrap();
        }

        let result = counts(&store, SelectQuery::group_by("user"));
        assert_eq!(result.count_for("alice"), 2);
        assert_eq!(result.count_for("bob"), 1);
        assert_eq!(result.grouped_key_count, 2);
        assert_eq!(result.record_count, 3);

        let result = counts(&store, SelectQuery::group_by("os$name"));
        assert_eq!(result.count_for("linux"), 2);
        assert_eq!(result.grouped_by.as_deref(), Some("os$name"));
    }

    #[test]
    fn test_limit_bounds_groups_by_recency() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": ""}));
        for user in ["alice", "bob", "alice", "carol", "bob"] {
            store.add_record(&json!({"user": user})).unwrap();
        }

        let result = counts(&store, SelectQuery::group_by("user").with_limit(2));
        assert_eq!(result.grouped_key_count, 2);
        assert_eq!(result.counts.keys().collect::<Vec<_>>(), vec!["bob", "carol"]);
        // Counts cover every row of the returned groups, not just recent ones
        assert_eq!(result.count_for("bob"), 2);
        assert_eq!(result.record_count, 3);
    }

    #[test]
    fn test_missing_field_inserts_nothing() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": "", "n": 0}));
        store.add_record(&json!({"user": "alice", "n": 1})).unwrap();

        let err = store.add_record(&json!({"user": "bob"})).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch(_)));
        assert_eq!(row_count(&store), 1);
    }

    #[test]
    fn test_hostile_values_are_bound() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": ""}));
        let hostile = "x'); DROP TABLE records; --";
        store.add_record(&json!({"user": hostile})).unwrap();

        let result = counts(&store, SelectQuery::group_by("user"));
        assert_eq!(result.count_for(hostile), 1);
        assert_eq!(row_count(&store), 1);
    }

    #[test]
    fn test_value_binding_by_type() {
        let (mut store, _temp_dir) = create_test_store(json!({"v": 0}));
        for v in [json!(3), json!(true), json!(null), json!(2.5), json!([1])] {
            store.add_record(&json!({"v": v})).unwrap();
        }

        let result = counts(&store, SelectQuery::group_by("v"));
        for key in ["3", "true", "null", "2.5", "[1]"] {
            assert_eq!(result.count_for(key), 1, "missing key {}", key);
        }
    }

    #[test]
    fn test_typed_columns() {
        let temp_dir = TempDir::new().unwrap();
        let mut column_types = BTreeMap::new();
        column_types.insert("n".to_string(), ColumnType::Integer);
        let mut store = IndexedStore::open(
            temp_dir.path().join("typed.db"),
            &json!({"n": 0}),
            IndexedStoreConfig {
                column_types,
                ..Default::default()
            },
        )
        .unwrap();
        store.add_record(&json!({"n": 7})).unwrap();

        let rows = store.raw_query("SELECT typeof(n) FROM records").unwrap();
        assert_eq!(rows, vec![vec![json!("integer")]]);
    }

    #[test]
    fn test_no_group_by_returns_empty() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": ""}));
        store.add_record(&json!({"user": "alice"})).unwrap();

        let value = serde_json::to_value(store.select_records(&SelectQuery::default()).unwrap())
            .unwrap();
        assert_eq!(value, json!({"record_count": 0}));
    }

    #[test]
    fn test_unknown_group_column() {
        let (store, _temp_dir) = create_test_store(json!({"user": ""}));
        assert!(matches!(
            store.select_records(&SelectQuery::group_by("missing")),
            Err(StoreError::UnknownColumn(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_raw_query_through_select() {
        let (mut store, _temp_dir) = create_test_store(json!({"user": ""}));
        store.add_record(&json!({"user": "alice"})).unwrap();

        let selection = store
            .select_records(&SelectQuery::raw("SELECT user, COUNT(*) FROM records GROUP BY user"))
            .unwrap();
        assert_eq!(selection, Selection::Rows(vec![vec![json!("alice"), json!(1)]]));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.db");
        let prototype = json!({"user": ""});
        {
            let mut store =
                IndexedStore::open(&path, &prototype, IndexedStoreConfig::default()).unwrap();
            store.add_record(&json!({"user": "alice"})).unwrap();
        }
        let store = IndexedStore::open(&path, &prototype, IndexedStoreConfig::default()).unwrap();
        assert_eq!(row_count(&store), 1);
        assert!(!store.export_snapshot().unwrap().is_empty());
    }
}
