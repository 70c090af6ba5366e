//! stalegate server entry point.
//!
//! Boots the caching proxy on the configured bind address. Logs are JSON on
//! stderr, filtered by `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use stalegate_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod headers;
mod metrics;
mod revalidate;
mod routes;
mod sink;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let bind = config.bind.clone();

    let state = handler::AppState::from_config(config).await?;
    let engine = state.engine.clone();

    tracing::info!(
        bind = %bind,
        origin = %state.origins.primary,
        failover = ?state.origins.failover.as_ref().map(|u| u.as_str()),
        prefix = %state.config.cache_prefix,
        error_sink = state.sink.is_enabled(),
        worst_case_fetch_ms = state.config.retry.worst_case().as_millis() as u64,
        "starting stalegate"
    );

    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("failed to bind {bind}"))?;
    axum::serve(listener, handler::create_app(state)).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("draining background revalidations");
    engine.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
