//! Table schema derived from a prototype record
//!
//! The prototype is flattened once into an ordered list of leaf fields, and
//! every SQL statement the indexed store needs is generated from that list
//! up front. Identifiers are always double-quoted; record values only ever
//! reach SQLite as bound parameters.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::{StoreError, StoreResult};
use crate::types::{is_valid_separator, ColumnType, FieldPath, FlatField, PathSegment};

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Whether `name` is a plain SQL identifier usable as a table name
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Flatten `prototype` into its leaf fields, sorted by path
///
/// Containers are descended into but never become fields. Object keys that
/// would not survive a join/parse round trip (empty, padded, all digits, or
/// containing `sep`) are rejected, since their column could never be
/// resolved again. `column_types` overrides the default `TEXT` type by
/// flattened name.
pub fn flatten_prototype(
    prototype: &Value,
    sep: char,
    column_types: &BTreeMap<String, ColumnType>,
) -> StoreResult<Vec<FlatField>> {
    let mut paths = Vec::new();
    collect_leaves(prototype, FieldPath::identity(), sep, &mut paths)?;
    paths.sort();

    if paths.is_empty() {
        return Err(StoreError::InvalidSchema(
            "prototype record has no leaf fields".to_string(),
        ));
    }

    let fields: Vec<FlatField> = paths
        .into_iter()
        .map(|path| {
            let name = path.join(sep);
            let column_type = column_types.get(&name).copied().unwrap_or_default();
            FlatField::new(path, sep, column_type)
        })
        .collect();

    if let Some(unknown) = column_types
        .keys()
        .find(|name| !fields.iter().any(|f| &f.name == *name))
    {
        return Err(StoreError::InvalidSchema(format!(
            "column type given for unknown field '{}'",
            unknown
        )));
    }

    Ok(fields)
}

fn collect_leaves(
    value: &Value,
    path: FieldPath,
    sep: char,
    out: &mut Vec<FieldPath>,
) -> StoreResult<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                check_key(key, sep)?;
                collect_leaves(child, path.child(PathSegment::Key(key.clone())), sep, out)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_leaves(child, path.child(PathSegment::Index(index)), sep, out)?;
            }
        }
        _ => {
            if !path.is_identity() {
                out.push(path);
            }
        }
    }
    Ok(())
}

fn check_key(key: &str, sep: char) -> StoreResult<()> {
    let round_trips = !key.is_empty()
        && key.trim() == key
        && !key.contains(sep)
        && key.parse::<usize>().is_err();
    if round_trips {
        Ok(())
    } else {
        Err(StoreError::InvalidSchema(format!(
            "prototype key {:?} cannot be addressed by a path",
            key
        )))
    }
}

/// Fields and pre-generated statements for one table
#[derive(Debug, Clone)]
pub struct TableSchema {
    table: String,
    separator: char,
    fields: Vec<FlatField>,
    create_sql: String,
    insert_sql: String,
    /// Aggregate statement per column name
    group_sql: HashMap<String, String>,
}

impl TableSchema {
    /// Flatten `prototype` and generate the statements for `table`
    pub fn from_prototype(
        table: &str,
        prototype: &Value,
        sep: char,
        column_types: &BTreeMap<String, ColumnType>,
    ) -> StoreResult<Self> {
        if !is_valid_table_name(table) {
            return Err(StoreError::InvalidSchema(format!(
                "invalid table name '{}'",
                table
            )));
        }
        if !is_valid_separator(sep) {
            return Err(StoreError::InvalidSchema(format!(
                "separator {:?} is not valid in an SQL identifier",
                sep
            )));
        }

        let fields = flatten_prototype(prototype, sep, column_types)?;
        let quoted_table = quote_ident(table);

        let column_defs: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), f.column_type))
            .collect();
        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted_table,
            column_defs.join(", ")
        );

        let column_names: Vec<String> = fields.iter().map(|f| quote_ident(&f.name)).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table,
            column_names.join(", "),
            placeholders.join(", ")
        );

        let group_sql = fields
            .iter()
            .map(|f| {
                let column = quote_ident(&f.name);
                let sql = format!(
                    "SELECT {col}, COUNT(*) FROM {table} GROUP BY {col} \
                     ORDER BY MAX(rowid) DESC LIMIT ?1",
                    col = column,
                    table = quoted_table
                );
                (f.name.clone(), sql)
            })
            .collect();

        Ok(Self {
            table: table.to_string(),
            separator: sep,
            fields,
            create_sql,
            insert_sql,
            group_sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FlatField] {
        &self.fields
    }

    pub fn create_sql(&self) -> &str {
        &self.create_sql
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    /// Column name for a `group_by` path, normalized through the path parser
    pub fn column_for(&self, group_by: &str) -> String {
        FieldPath::parse(group_by, self.separator).join(self.separator)
    }

    /// The aggregate statement grouping by `group_by`, if it names a column
    pub fn group_sql(&self, group_by: &str) -> Option<&str> {
        self.group_sql
            .get(&self.column_for(group_by))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_types() -> BTreeMap<String, ColumnType> {
        BTreeMap::new()
    }

    fn names(fields: &[FlatField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_flatten_leaves_sorted() {
        let prototype = json!({
            "username": "",
            "uname": ["", ""],
            "python": {"version": "", "is_64bit": true, "empty": {}},
        });

        let fields = flatten_prototype(&prototype, '$', &no_types()).unwrap();

        assert_eq!(
            names(&fields),
            vec!["python$is_64bit", "python$version", "uname$0", "uname$1", "username"]
        );
        assert!(fields.iter().all(|f| f.column_type == ColumnType::Text));
        assert_eq!(
            fields[2].path.segments(),
            &[PathSegment::Key("uname".to_string()), PathSegment::Index(0)]
        );
    }

    #[test]
    fn test_flatten_type_overrides() {
        let prototype = json!({"n": 0, "user": ""});
        let mut types = BTreeMap::new();
        types.insert("n".to_string(), ColumnType::Integer);

        let fields = flatten_prototype(&prototype, '$', &types).unwrap();
        assert_eq!(fields[0].column_type, ColumnType::Integer);
        assert_eq!(fields[1].column_type, ColumnType::Text);

        types.insert("missing".to_string(), ColumnType::Real);
        assert!(matches!(
            flatten_prototype(&prototype, '$', &types),
            Err(StoreError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_flatten_rejects_unaddressable_keys() {
        for prototype in [json!({"123": ""}), json!({"a$b": ""}), json!({" a": ""}), json!({"": 1})] {
            assert!(
                matches!(
                    flatten_prototype(&prototype, '$', &no_types()),
                    Err(StoreError::InvalidSchema(_))
                ),
                "expected {} to be rejected",
                prototype
            );
        }
    }

    #[test]
    fn test_flatten_rejects_leafless_prototype() {
        for prototype in [json!("scalar"), json!({}), json!({"a": {"b": []}})] {
            assert!(matches!(
                flatten_prototype(&prototype, '$', &no_types()),
                Err(StoreError::InvalidSchema(_))
            ));
        }
    }

    #[test]
    fn test_generated_statements() {
        let prototype = json!({"user": "", "python": {"version": ""}});
        let schema = TableSchema::from_prototype("records", &prototype, '$', &no_types()).unwrap();

        assert_eq!(
            schema.create_sql(),
            "CREATE TABLE IF NOT EXISTS \"records\" (\"python$version\" TEXT, \"user\" TEXT)"
        );
        assert_eq!(
            schema.insert_sql(),
            "INSERT INTO \"records\" (\"python$version\", \"user\") VALUES (?1, ?2)"
        );
        assert_eq!(
            schema.group_sql("python$version").unwrap(),
            "SELECT \"python$version\", COUNT(*) FROM \"records\" GROUP BY \"python$version\" \
             ORDER BY MAX(rowid) DESC LIMIT ?1"
        );
        assert!(schema.group_sql(" python $ version ").is_some());
        assert!(schema.group_sql("nope").is_none());
    }

    #[test]
    fn test_table_name_and_separator_validation() {
        let prototype = json!({"a": 1});
        assert!(TableSchema::from_prototype("bad name", &prototype, '$', &no_types()).is_err());
        assert!(TableSchema::from_prototype("x\"; DROP", &prototype, '$', &no_types()).is_err());
        assert!(TableSchema::from_prototype("records", &prototype, '.', &no_types()).is_err());
        assert!(is_valid_table_name("_t1$"));
        assert!(!is_valid_table_name("1t"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
