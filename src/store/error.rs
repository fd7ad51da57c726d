//! Store errors

use thiserror::Error;

use crate::types::PathError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record lacks a field the table schema requires
    #[error("record does not match table schema: {0}")]
    SchemaMismatch(#[source] PathError),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl StoreError {
    /// Whether this is a disk or database failure rather than a caller mistake
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_) | StoreError::Json(_) | StoreError::Sqlite(_)
        )
    }
}
