//! Gaze Stream Server
//!
//! Serves the tracking control API and the live `/ws` gaze stream.
//!
//! Usage: `gaze-server [config.toml]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gaze_stream::{
    config::AppConfig,
    source::SimulatedSource,
    tracking::TrackingController,
    ui::{AppState, WebServer},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gaze Stream server");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    let controller = Arc::new(TrackingController::from_config(
        SimulatedSource::new(),
        &config.tracking,
    ));

    let state = Arc::new(AppState::new(&config, controller.clone()));
    let server = WebServer::new(config.server.clone(), state);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await
        .context("web server failed")?;

    tracing::info!("Cleaning up resources before shutdown");
    tokio::task::spawn_blocking(move || controller.shutdown())
        .await
        .context("controller shutdown failed")?;

    Ok(())
}
