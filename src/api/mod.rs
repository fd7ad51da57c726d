//! API module for HTTP endpoints
//!
//! Routes telemetry imports and count queries to the configured record store.

pub mod http;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use state::AppState;
