//! Server configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or none at all) yields a working line-log server on port 8888.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8888"
//!
//! [storage]
//! backend = "sqlite"
//! data_path = "/var/lib/metrics/metrics_data.db"
//! prototype_path = "prototype.json"
//!
//! [storage.column_types]
//! "time$std_utc_offset" = "real"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{is_valid_table_name, Backend, DEFAULT_FLUSH_INTERVAL, DEFAULT_TABLE};
use crate::types::{is_valid_separator, ColumnType, DEFAULT_SEPARATOR};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable permissive CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Which record store to use
    #[serde(default)]
    pub backend: Backend,

    /// Data file; defaults to `metrics_data.<ext>` in the working directory
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Line store: writes between flushes to disk
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,

    /// Separator for `group_by` paths and flattened column names
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Indexed store: table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Indexed store: JSON file holding the prototype record
    #[serde(default)]
    pub prototype_path: Option<PathBuf>,

    /// Indexed store: column type overrides by flattened name
    #[serde(default)]
    pub column_types: BTreeMap<String, ColumnType>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_path: None,
            flush_interval: default_flush_interval(),
            separator: default_separator(),
            table: default_table(),
            prototype_path: None,
            column_types: BTreeMap::new(),
        }
    }
}

impl StorageConfig {
    /// The configured data path, or the backend's default
    pub fn resolved_data_path(&self) -> PathBuf {
        self.data_path
            .clone()
            .unwrap_or_else(|| self.backend.default_path())
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_true() -> bool {
    true
}

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl ServerConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;
        if storage.flush_interval == 0 {
            bail!("storage.flush_interval must be at least 1");
        }
        if !is_valid_separator(storage.separator) {
            bail!(
                "storage.separator {:?} must be valid in an SQL identifier ($, _ or alphanumeric)",
                storage.separator
            );
        }
        if !is_valid_table_name(&storage.table) {
            bail!("storage.table {:?} is not a valid table name", storage.table);
        }
        self.server
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("invalid server.listen_addr {:?}", self.server.listen_addr))?;
        Ok(())
    }
}
