//! Data file download endpoint

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use super::ApiError;
use crate::api::state::AppState;
use crate::store::DEFAULT_PREFIX;

/// GET /v1/download/import - Raw bytes of the data file
pub async fn download_import(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let (bytes, file_name) = state
        .read_store(|store| {
            let file_name = store
                .file_path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
            store.export_snapshot().map(|bytes| (bytes, file_name))
        })
        .await?;

    tracing::debug!(size = bytes.len(), file = %file_name, "exporting data file");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
