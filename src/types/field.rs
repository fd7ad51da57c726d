//! Flattened field descriptors for the indexed store

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FieldPath;

/// Declared SQLite column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Real,
    Numeric,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One leaf of the prototype record, mapped to a table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatField {
    pub path: FieldPath,
    /// Path segments joined by the separator
    pub name: String,
    pub column_type: ColumnType,
}

impl FlatField {
    pub fn new(path: FieldPath, sep: char, column_type: ColumnType) -> Self {
        let name = path.join(sep);
        Self {
            path,
            name,
            column_type,
        }
    }
}
