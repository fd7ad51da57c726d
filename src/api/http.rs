//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rest::{count, download, ingest};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>, enable_cors: bool) -> Router {
    let v1 = Router::new()
        .route("/on_import", post(ingest::on_import))
        .route("/count", get(count::get_count))
        .route("/download/import", get(download::download_import));

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if enable_cors {
        // Telemetry clients post from anywhere
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LineLogStore, LineStoreConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn test_app(temp_dir: &TempDir) -> Router {
        let config = LineStoreConfig::new(temp_dir.path().join("metrics_data.jsonl"));
        let store = LineLogStore::open(config).unwrap();
        create_router(Arc::new(AppState::new(Box::new(store))), true)
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        let response = app
            .oneshot(Request::builder().uri("/v2/count").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_import_requires_post() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        let response = app
            .oneshot(Request::builder().uri("/v1/on_import").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
