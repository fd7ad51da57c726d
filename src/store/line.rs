//! Line Log Store - append-only JSON Lines backend
//!
//! One JSON object per line, per <http://jsonlines.org/>. Writes only ever
//! append, so the worst a crash can leave behind is a truncated final line,
//! which readers skip. Queries with a limit scan backward from the end of
//! the file; queries without one read forward over everything.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::jsonl::{open_records, Direction};
use super::{Backend, RecordStore, SelectQuery, Selection, StoreResult};
use crate::aggregate::count_records;
use crate::types::DEFAULT_SEPARATOR;

/// Flush to disk on every new record
pub const DEFAULT_FLUSH_INTERVAL: u64 = 1;

/// Configuration for the LineLogStore
#[derive(Debug, Clone)]
pub struct LineStoreConfig {
    /// Path to the `.jsonl` file
    pub file_path: PathBuf,
    /// Number of writes between flushes to stable storage
    pub flush_interval: u64,
    /// Separator for `group_by` paths
    pub separator: char,
}

impl LineStoreConfig {
    /// Create config for a file with default cadence and separator
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn with_flush_interval(mut self, flush_interval: u64) -> Self {
        self.flush_interval = flush_interval;
        self
    }
}

/// Append-only JSON Lines record store
pub struct LineLogStore {
    config: LineStoreConfig,
    file: File,
    /// Serialized lines accepted but not yet written, at most
    /// `flush_interval - 1` of them
    pending: Vec<u8>,
    /// Records written by this instance. Not recovered from the file on
    /// open, so the flush cadence restarts with the process.
    write_count: u64,
}

impl LineLogStore {
    /// Open (creating if absent) the log for appending
    pub fn open(config: LineStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file_path)?;

        tracing::info!(
            path = %config.file_path.display(),
            flush_interval = config.flush_interval,
            "opened line log store"
        );

        Ok(Self {
            config: LineStoreConfig {
                flush_interval: config.flush_interval.max(1),
                ..config
            },
            file,
            pending: Vec::new(),
            write_count: 0,
        })
    }

    /// Records written since this instance was opened
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Iterate stored records oldest first
    pub fn records(&self) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Value>>>> {
        open_records(&self.config.file_path, Direction::Forward)
    }

    /// Iterate stored records newest first
    pub fn recent_records(&self) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Value>>>> {
        open_records(&self.config.file_path, Direction::Reverse)
    }

    /// Append `pending` with a single write and sync it
    ///
    /// On failure the file is cut back to its previous length, so a failed
    /// call leaves neither a partial line nor a line the caller was told
    /// had failed. `pending` is kept for the caller to roll back.
    fn write_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let start = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(&self.pending)
            .and_then(|()| self.file.sync_data());

        if let Err(e) = written {
            if let Err(truncate_err) = self.file.set_len(start) {
                tracing::error!(
                    error = %truncate_err,
                    len = start,
                    "failed to roll back partial append"
                );
            }
            return Err(e);
        }
        self.pending.clear();
        Ok(())
    }
}

impl RecordStore for LineLogStore {
    fn backend(&self) -> Backend {
        Backend::Line
    }

    fn file_path(&self) -> &Path {
        &self.config.file_path
    }

    fn add_record(&mut self, record: &Value) -> StoreResult<()> {
        // Serialize fully before touching the buffer so a failure never leaves half a line
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mark = self.pending.len();
        self.pending.extend_from_slice(&line);

        if (self.write_count + 1) % self.config.flush_interval == 0 {
            if let Err(e) = self.write_pending() {
                // Earlier buffered records stay queued; this one is dropped
                self.pending.truncate(mark);
                return Err(e.into());
            }
        }

        self.write_count += 1;
        tracing::debug!(
            write_count = self.write_count,
            bytes = line.len(),
            buffered = self.pending.len(),
            "appended record"
        );
        Ok(())
    }

    fn select_records(&self, query: &SelectQuery) -> StoreResult<Selection> {
        if let Some(raw) = &query.raw_query {
            return self.raw_query(raw).map(Selection::Rows);
        }

        let limit = query.effective_limit();
        let records = match limit {
            Some(_) => self.recent_records()?,
            None => self.records()?,
        };

        let result = count_records(
            records,
            query.effective_group_by(),
            self.config.separator,
            limit,
        )?;

        tracing::debug!(
            group_by = ?query.group_by,
            limit = ?limit,
            record_count = result.record_count,
            "counted line log records"
        );
        Ok(Selection::Counts(result))
    }

    fn export_snapshot(&self) -> StoreResult<Vec<u8>> {
        Ok(std::fs::read(&self.config.file_path)?)
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.write_pending()?;
        Ok(())
    }
}

impl Drop for LineLogStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "failed to flush line log on close");
        }
    }
}
