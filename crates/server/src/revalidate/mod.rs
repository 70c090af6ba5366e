//! Stale-while-revalidate decision engine.
//!
//! For each cacheable request the engine looks the key up, classifies the
//! entry's age against the resource's TTL pair and then either serves it
//! (fresh), serves it and refreshes in the background (stale), or fetches
//! synchronously (expired or missing). When a synchronous fetch fails, any
//! entry at all is served in preference to an error.

mod refresh;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::Utc;
use stalegate_client::{FetchError, FetchResponse, OriginSet, RetryingFetcher};
use stalegate_core::{CacheEntry, CacheKey, CacheStore, Freshness, FreshnessPolicy, RetryPlan, TtlPair};
use tokio_util::task::TaskTracker;

pub use refresh::{Refresh, Refresher};

use crate::headers::{self, Diagnostics};
use crate::metrics::{CacheEvent, Metrics};

/// Engine failures that reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No cached entry and no origin response.
    #[error("UPSTREAM_UNREACHABLE: {0}")]
    Upstream(#[from] FetchError),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::Upstream(FetchError::InvalidUrl(_) | FetchError::Client(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EngineError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A response decided by the engine, before standard headers are layered on.
#[derive(Debug, Clone)]
pub struct Served {
    pub status: StatusCode,
    /// Stored or origin headers.
    pub headers: HeaderMap,
    pub body: Bytes,
    pub diagnostics: Diagnostics,
}

impl Served {
    fn entry(entry: CacheEntry, diagnostics: Diagnostics) -> Self {
        Self { status: entry.status, headers: entry.headers, body: entry.body, diagnostics }
    }

    fn relayed(response: FetchResponse, diagnostics: Diagnostics) -> Self {
        Self {
            status: response.status,
            headers: headers::storable(&response.headers),
            body: response.bytes,
            diagnostics,
        }
    }
}

pub struct RevalidationEngine {
    refresher: Refresher,
    tracker: TaskTracker,
    metrics: Arc<Metrics>,
}

impl RevalidationEngine {
    pub fn new(store: Arc<dyn CacheStore>, fetcher: RetryingFetcher, plan: RetryPlan, metrics: Arc<Metrics>) -> Self {
        Self { refresher: Refresher::new(store, fetcher, plan), tracker: TaskTracker::new(), metrics }
    }

    pub fn store_name(&self) -> &'static str {
        self.refresher.store.name()
    }

    /// Decide the response for a cacheable request.
    ///
    /// # Errors
    ///
    /// `EngineError::Upstream` only when the origins produced no response and
    /// nothing is cached under `key`.
    pub async fn handle(
        &self, key: &CacheKey, origins: &OriginSet, policy: &FreshnessPolicy,
    ) -> Result<Served, EngineError> {
        let ttl = policy.resolve(key.path_and_query());
        let cached = self.lookup(key).await;

        if let Some(entry) = &cached {
            let age = entry.age(Utc::now());
            match ttl.classify(age) {
                Freshness::Fresh => {
                    tracing::debug!(key = %key, age = ?age, "fresh hit");
                    self.metrics.record(CacheEvent::FreshHit);
                    return Ok(Served::entry(entry.clone(), Diagnostics::fresh(age)));
                }
                Freshness::Stale => {
                    tracing::debug!(key = %key, age = ?age, "stale hit, revalidating in background");
                    self.metrics.record(CacheEvent::StaleHit);
                    self.spawn_revalidation(key.clone(), origins.clone(), ttl);
                    return Ok(Served::entry(entry.clone(), Diagnostics::stale(age)));
                }
                Freshness::Expired => tracing::debug!(key = %key, age = ?age, "expired entry, fetching"),
            }
        }

        match self.refresher.refresh(key, origins, ttl).await {
            Ok(Refresh::Stored(entry)) => {
                self.metrics.record(CacheEvent::Miss);
                Ok(Served::entry(entry, Diagnostics::updated()))
            }
            Ok(Refresh::Rejected(response)) => match cached {
                Some(entry) => Ok(self.serve_stale_error(key, entry, &format!("origin status {}", response.status))),
                None => {
                    tracing::debug!(key = %key, status = response.status.as_u16(), "relaying origin error");
                    self.metrics.record(CacheEvent::Bypass);
                    Ok(Served::relayed(response, Diagnostics::bypass()))
                }
            },
            Err(e) => match cached {
                Some(entry) => Ok(self.serve_stale_error(key, entry, &e.to_string())),
                None => {
                    tracing::warn!(key = %key, error = %e, "origin unreachable with nothing cached");
                    self.metrics.record(CacheEvent::UpstreamError);
                    Err(e.into())
                }
            },
        }
    }

    /// Close the task tracker and wait for in-flight revalidations.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.refresher.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, store = self.store_name(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn serve_stale_error(&self, key: &CacheKey, entry: CacheEntry, reason: &str) -> Served {
        tracing::warn!(key = %key, reason = %reason, "revalidation failed, serving cached entry");
        self.metrics.record(CacheEvent::StaleError);
        let age = entry.age(Utc::now());
        Served::entry(entry, Diagnostics::stale_error(age))
    }

    fn spawn_revalidation(&self, key: CacheKey, origins: OriginSet, ttl: TtlPair) {
        let refresher = self.refresher.clone();
        let metrics = self.metrics.clone();
        metrics.record(CacheEvent::RevalidationStarted);

        self.tracker.spawn(async move {
            match refresher.refresh(&key, &origins, ttl).await {
                Ok(Refresh::Stored(_)) => tracing::debug!(key = %key, "background revalidation stored"),
                Ok(Refresh::Rejected(response)) => {
                    metrics.record(CacheEvent::RevalidationFailed);
                    tracing::warn!(key = %key, status = response.status.as_u16(), "background revalidation rejected");
                }
                Err(e) => {
                    metrics.record(CacheEvent::RevalidationFailed);
                    tracing::warn!(key = %key, error = %e, "background revalidation failed");
                }
            }
        });
    }
}
