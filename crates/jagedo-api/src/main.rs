//! # jagedo-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the settlement engine.
//! Configuration comes from the environment; see [`AppConfig::from_env`].

use jagedo_api::state::{AppConfig, LogFormat};
use jagedo_api::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let port = config.port;
    let state = AppState::with_config(config).map_err(|e| {
        tracing::error!("Metrics registry initialization failed: {e}");
        e
    })?;
    tracing::info!(config = ?state.config, "configuration loaded");

    let app = jagedo_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("JaGedo API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
