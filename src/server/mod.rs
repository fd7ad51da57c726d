//! Metrics HTTP server
//!
//! Owns the opened record store and serves the API until shutdown, then
//! flushes the store so buffered line-store writes reach disk.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::ServerConfig;
use crate::store::open_store;

/// HTTP server bound to one record store
pub struct MetricsServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl MetricsServer {
    /// Validate `config` and open its store
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage).with_context(|| {
            format!(
                "failed to open {} store at {}",
                config.storage.backend,
                config.storage.resolved_data_path().display()
            )
        })?;

        Ok(Self {
            config,
            state: Arc::new(AppState::new(store)),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn router(&self) -> Router {
        create_router(self.state(), self.config.server.enable_cors)
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then flush the store
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = &self.config.server.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!(
            "Metrics server listening on {} ({} store at {})",
            listener.local_addr()?,
            self.config.storage.backend,
            self.config.storage.resolved_data_path().display()
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("HTTP server received shutdown signal");
            })
            .await?;

        self.state
            .write_store(|store| store.flush())
            .await
            .map_err(|e| anyhow::anyhow!("failed to flush store on shutdown: {}", e.error))?;

        info!(
            imports = self.state.imports_accepted(),
            "HTTP server shutdown complete"
        );
        Ok(())
    }
}
