//! Record stores: the data access layer
//!
//! Every backend implements [`RecordStore`]:
//! - `LineLogStore`: append-only JSON Lines file, scanned backward for recent records
//! - `IndexedStore`: SQLite table flattened from a prototype record, grouped in SQL
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌───────────┐    ┌──────────────┐    ┌─────────────────────────────┐
//! │ on_import │───►│ add_record() │───►│ jsonl: append line + flush  │
//! │ request   │    └──────────────┘    │ sqlite: bound INSERT        │
//! └───────────┘                        └─────────────────────────────┘
//!
//! Read Path:
//! ┌───────────┐    ┌──────────────────┐    ┌─────────────────────────────┐
//! │ count     │───►│ select_records() │───►│ jsonl: reverse scan + count │
//! │ request   │    └──────────────────┘    │ sqlite: GROUP BY statement  │
//! └───────────┘                            └─────────────────────────────┘
//! ```
//!
//! The two backends interpret `limit` differently. The line store counts the
//! `limit` most recent records; the indexed store returns the `limit` most
//! recently inserted groups. Without a `group_by`, the line store counts
//! everything under `"*"` while the indexed store returns the empty result.

mod error;
pub mod jsonl;
mod line;
mod prototype;
mod schema;
mod sqlite;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StorageConfig;
use crate::types::GroupCountResult;

pub use error::{StoreError, StoreResult};
pub use line::{LineLogStore, LineStoreConfig, DEFAULT_FLUSH_INTERVAL};
pub use prototype::default_prototype;
pub use schema::{flatten_prototype, is_valid_table_name, TableSchema};
pub use sqlite::{IndexedStore, IndexedStoreConfig, DEFAULT_TABLE};

/// Prefix of the default data file name
pub const DEFAULT_PREFIX: &str = "metrics_data";

/// Available storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Line,
    #[serde(alias = "sql")]
    Sqlite,
}

impl Backend {
    /// File extension for this backend's data file
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::Line => "jsonl",
            Backend::Sqlite => "db",
        }
    }

    /// Default data file path, relative to the working directory
    pub fn default_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.{}", DEFAULT_PREFIX, self.extension()))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Line => write!(f, "line"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "jsonl" => Ok(Backend::Line),
            "sqlite" | "sql" => Ok(Backend::Sqlite),
            other => Err(format!("unrecognized backend name: {:?}", other)),
        }
    }
}

/// Parameters of a `select_records` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// Restrict to recent records (line store) or recent groups (indexed store).
    /// `None` and `Some(0)` both mean no limit.
    pub limit: Option<usize>,
    /// Path to group by; `None` counts everything under one key
    pub group_by: Option<String>,
    /// Backend-specific query text, passed through verbatim
    pub raw_query: Option<String>,
}

impl SelectQuery {
    pub fn group_by(group_by: impl Into<String>) -> Self {
        Self {
            group_by: Some(group_by.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn raw(query: impl Into<String>) -> Self {
        Self {
            raw_query: Some(query.into()),
            ..Default::default()
        }
    }

    /// The limit, with zero normalized away
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&l| l > 0)
    }

    /// The group-by path, with blank strings normalized away
    pub fn effective_group_by(&self) -> Option<&str> {
        self.group_by.as_deref().filter(|g| !g.trim().is_empty())
    }
}

/// Rows returned verbatim by a raw query
pub type RawRows = Vec<Vec<Value>>;

/// Output of `select_records`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    Counts(GroupCountResult),
    Rows(RawRows),
}

impl Selection {
    /// The grouping result, if this was a count query
    pub fn into_counts(self) -> Option<GroupCountResult> {
        match self {
            Selection::Counts(counts) => Some(counts),
            Selection::Rows(_) => None,
        }
    }
}

/// The data access layer contract
///
/// Stores are shared behind a read-write lock, so queries (`&self`) from
/// several requests may run at once while appends (`&mut self`) are
/// exclusive.
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Path of the file backing this store
    fn file_path(&self) -> &Path;

    /// Durably append one record, subject to the backend's flush policy
    fn add_record(&mut self, record: &Value) -> StoreResult<()>;

    /// Count records grouped by a path, or run a raw query
    fn select_records(&self, query: &SelectQuery) -> StoreResult<Selection>;

    /// Run backend-specific query text
    fn raw_query(&self, _query: &str) -> StoreResult<RawRows> {
        Err(StoreError::Unsupported(format!(
            "{} store does not support raw queries",
            self.backend()
        )))
    }

    /// Raw bytes of the persisted store
    fn export_snapshot(&self) -> StoreResult<Vec<u8>>;

    /// Force buffered writes to stable storage
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Open the store selected by `config`
pub fn open_store(config: &StorageConfig) -> StoreResult<Box<dyn RecordStore>> {
    let path = config.resolved_data_path();
    tracing::info!(backend = %config.backend, path = %path.display(), "opening record store");

    match config.backend {
        Backend::Line => {
            let store_config = LineStoreConfig {
                file_path: path,
                flush_interval: config.flush_interval,
                separator: config.separator,
            };
            Ok(Box::new(LineLogStore::open(store_config)?))
        }
        Backend::Sqlite => {
            let prototype = match &config.prototype_path {
                Some(proto_path) => {
                    let text = std::fs::read_to_string(proto_path)?;
                    serde_json::from_str(&text)?
                }
                None => default_prototype(),
            };
            let store_config = IndexedStoreConfig {
                table: config.table.clone(),
                separator: config.separator,
                column_types: config.column_types.clone(),
            };
            Ok(Box::new(IndexedStore::open(path, &prototype, store_config)?))
        }
    }
}
