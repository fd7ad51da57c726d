//! REST API module for HTTP endpoints
//!
//! Provides the metrics endpoints:
//! - `POST /v1/on_import` - Store one telemetry record
//! - `GET /v1/count` - Group and count stored records
//! - `GET /v1/download/import` - Raw bytes of the data file

pub mod count;
pub mod download;
pub mod ingest;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, "UNSUPPORTED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SchemaMismatch(_) | StoreError::UnknownColumn(_) => {
                ApiError::bad_request(err.to_string())
            }
            StoreError::Unsupported(_) => ApiError::unsupported(err.to_string()),
            _ => {
                tracing::error!(error = %err, io_failure = err.is_io_failure(), "store operation failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PathError;

    #[test]
    fn test_store_error_status_mapping() {
        let mismatch = StoreError::SchemaMismatch(PathError::NotAString("user".to_string()));
        assert_eq!(ApiError::from(mismatch).status, StatusCode::BAD_REQUEST);

        let unknown = ApiError::from(StoreError::UnknownColumn("nope".to_string()));
        assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
        assert_eq!(unknown.code, "BAD_REQUEST");

        let unsupported = ApiError::from(StoreError::Unsupported("raw".to_string()));
        assert_eq!(unsupported.status, StatusCode::NOT_IMPLEMENTED);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert_eq!(
            ApiError::from(StoreError::from(io)).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_omits_status() {
        let body = serde_json::to_value(ApiError::bad_request("empty body")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "empty body", "code": "BAD_REQUEST"})
        );
    }
}
