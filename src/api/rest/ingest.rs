//! Record ingestion endpoint

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::ApiError;
use crate::api::state::AppState;
use crate::utils::server_time;

/// Field the server stamps onto every imported record
pub const SERVER_TIME_FIELD: &str = "server_time";

/// Malformed import payloads
#[derive(Debug, Error)]
pub enum InputError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
}

/// Parse an import body and stamp it with `server_time`
pub fn prepare_record(body: &[u8], stamp: String) -> Result<Value, InputError> {
    if body.is_empty() {
        return Err(InputError::EmptyBody);
    }
    match serde_json::from_slice(body)? {
        Value::Object(mut map) => {
            map.insert(SERVER_TIME_FIELD.to_string(), Value::String(stamp));
            Ok(Value::Object(map))
        }
        _ => Err(InputError::NotAnObject),
    }
}

/// POST /v1/on_import - Store one record
pub async fn on_import(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ApiError> {
    let record = prepare_record(&body, server_time())?;
    state.write_store(move |store| store.add_record(&record)).await?;

    let total = state.record_import();
    tracing::debug!(total, "record imported");

    Ok(Json(ImportResponse { success: true }))
}
