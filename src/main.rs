//! Metrics Store - Binary Entry Point
//!
//! This is the main entry point for the metrics-server binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_store::config::ServerConfig;
use metrics_store::store::Backend;
use metrics_store::MetricsServer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "METRICS_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Storage backend: line or sqlite (overrides config file)
    #[arg(long, env = "METRICS_BACKEND")]
    backend: Option<Backend>,

    /// Data file path (overrides config file)
    #[arg(long, env = "METRICS_DATA_PATH")]
    data_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metrics_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(data_path) = args.data_path {
        config.storage.data_path = Some(data_path);
    }

    MetricsServer::new(config)?.run().await
}
