//! Shared application state for HTTP handlers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::rest::ApiError;
use crate::store::{RecordStore, StoreResult};

/// State shared by every request
pub struct AppState {
    /// The record store: queries share a read lock, appends take the write lock
    pub store: Arc<RwLock<Box<dyn RecordStore>>>,

    /// Records accepted since startup
    pub import_counter: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            import_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run a query against the store on the blocking pool
    ///
    /// Store calls do synchronous file and SQLite I/O, so they never run on
    /// an async worker thread.
    pub async fn read_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&dyn RecordStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store).read_owned().await;
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| ApiError::internal(format!("store task failed: {}", e)))?;
        Ok(result?)
    }

    /// Run an update against the store on the blocking pool
    pub async fn write_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut dyn RecordStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut store = Arc::clone(&self.store).write_owned().await;
        let result = tokio::task::spawn_blocking(move || f(store.as_mut()))
            .await
            .map_err(|e| ApiError::internal(format!("store task failed: {}", e)))?;
        Ok(result?)
    }

    /// Note one accepted import and return the new total
    pub fn record_import(&self) -> u64 {
        self.import_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn imports_accepted(&self) -> u64 {
        self.import_counter.load(Ordering::SeqCst)
    }
}
