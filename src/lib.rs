//! Metrics Store
//!
//! A small telemetry ingest server: clients POST JSON records, the server
//! stamps and persists them, and operators query grouped counts over the
//! stored data.
//!
//! # Features
//!
//! - **Pluggable storage**: append-only JSON Lines file or a SQLite table
//!   flattened from a prototype record
//! - **Recent-first counting**: the line store scans its file backward so a
//!   `limit` query only touches the newest records
//! - **Path addressing**: `python$version_info$0` reaches into nested records
//! - **Tolerant reads**: malformed lines are counted, not fatal
//!
//! # Modules
//!
//! - `types`: Field paths, flattened fields and count results
//! - `store`: The `RecordStore` trait and its backends
//! - `aggregate`: Group-by counting over record streams
//! - `config`: TOML server configuration
//! - `api`: Axum router and REST handlers
//! - `server`: Listener, graceful shutdown and final store flush
//! - `utils`: Timestamp helpers
//!
//! # Example
//!
//! ```no_run
//! use metrics_store::config::StorageConfig;
//! use metrics_store::store::{open_store, SelectQuery};
//! use serde_json::json;
//!
//! let mut store = open_store(&StorageConfig::default()).unwrap();
//! store.add_record(&json!({"user": "alice"})).unwrap();
//!
//! let counts = store
//!     .select_records(&SelectQuery::group_by("user"))
//!     .unwrap()
//!     .into_counts()
//!     .unwrap();
//! assert_eq!(counts.count_for("alice"), 1);
//! ```

pub mod aggregate;
pub mod api;
pub mod config;
pub mod server;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{ServerConfig, StorageConfig};
pub use server::MetricsServer;
pub use store::{open_store, Backend, RecordStore, SelectQuery, Selection, StoreError, StoreResult};
pub use types::{FieldPath, GroupCountResult, PathError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
