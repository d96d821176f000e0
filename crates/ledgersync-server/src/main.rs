//! ledgersyncd - HTTP service for sync chunks and enrichment batches
//!
//! Reads the configuration from `$LEDGERSYNC_CONFIG` or the default
//! path, binds `server.bind_address`, and serves until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ledgersync_core::config::Config;
use ledgersync_server::{serve, shutdown_signal, AppState};

/// Overrides the configuration file location
const ENV_CONFIG_PATH: &str = "LEDGERSYNC_CONFIG";

fn load_config() -> Result<(Config, PathBuf)> {
    let path = std::env::var_os(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let mut config = if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };
    config.apply_env();
    Ok((config, path))
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_path) = load_config()?;
    init_tracing(&config);

    info!(config = %config_path.display(), "ledgersyncd starting");
    for problem in config.validate() {
        warn!(%problem, "Configuration problem");
    }

    let (state, pool) = AppState::from_config(&config).await?;
    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = serve(listener, Arc::new(state), shutdown_token).await;
    pool.close().await;

    match &result {
        Ok(()) => info!("ledgersyncd shut down gracefully"),
        Err(e) => error!(error = %e, "ledgersyncd exiting with error"),
    }
    result
}
