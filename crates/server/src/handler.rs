//! Shared application state and router assembly.
//!
//! Configuration, origins and the engine are built once at startup and
//! shared immutably by every request.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use stalegate_client::{FetchConfig, OriginClient, OriginSet, RetryingFetcher, Upstream};
use stalegate_core::config::StoreBackend;
use stalegate_core::{AppConfig, CacheDb, CacheStore, MemoryStore};
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;
use crate::revalidate::RevalidationEngine;
use crate::routes;
use crate::sink::ErrorSink;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub origins: Arc<OriginSet>,
    pub engine: Arc<RevalidationEngine>,
    /// Client for passthrough requests.
    pub client: Arc<OriginClient>,
    pub metrics: Arc<Metrics>,
    pub sink: ErrorSink,
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(
        config: AppConfig, store: Arc<dyn CacheStore>, upstream: Arc<dyn Upstream>, client: Arc<OriginClient>,
    ) -> anyhow::Result<Self> {
        let origins = OriginSet::from_config(&config).context("invalid origin configuration")?;
        let sink = ErrorSink::new(config.error_sink_url.as_deref()).context("invalid error_sink_url")?;
        let metrics = Arc::new(Metrics::default());
        let engine = RevalidationEngine::new(
            store,
            RetryingFetcher::new(upstream),
            config.retry.clone(),
            metrics.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            origins: Arc::new(origins),
            engine: Arc::new(engine),
            client,
            metrics,
            sink,
        })
    }

    /// Build state for a configuration: open the store and the origin client.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store = open_store(&config).await?;
        let client = Arc::new(OriginClient::new(FetchConfig::from(&config))?);
        Self::new(config, store, client.clone(), client)
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new(config.memory_capacity_bytes)),
        StoreBackend::Sqlite => Arc::new(
            CacheDb::open(&config.db_path)
                .await
                .with_context(|| format!("failed to open cache database {}", config.db_path.display()))?,
        ),
    };
    tracing::info!(store = store.name(), "cache store ready");
    Ok(store)
}

/// Build the HTTP surface.
///
/// Layers run outside-in: tracing, response timing, CORS preflight, routing.
pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(routes::health::health).fallback(routes::dispatch))
        .route("/health", get(routes::health::health).fallback(routes::dispatch));

    if state.config.enable_metrics {
        router = router.route("/metrics", get(routes::health::metrics).fallback(routes::dispatch));
    }

    router
        .fallback(routes::dispatch)
        .with_state(state)
        .layer(middleware::from_fn(routes::preflight))
        .layer(middleware::from_fn(routes::response_time))
        .layer(TraceLayer::new_for_http())
}
