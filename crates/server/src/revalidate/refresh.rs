//! One fetch-and-store cycle against the origins.

use std::sync::Arc;

use chrono::Utc;
use stalegate_client::{FetchError, FetchResponse, OriginSet, RetryingFetcher};
use stalegate_core::{CacheEntry, CacheKey, CacheStore, RetryPlan, TtlPair};

use crate::headers;

/// Result of a refresh that reached an origin.
#[derive(Debug)]
pub enum Refresh {
    /// 2xx/3xx response, now in the store.
    Stored(CacheEntry),
    /// Error-class response after retries. Nothing was stored.
    Rejected(FetchResponse),
}

/// Everything a refresh needs, cheap to clone into background tasks.
#[derive(Clone)]
pub struct Refresher {
    pub(crate) store: Arc<dyn CacheStore>,
    fetcher: RetryingFetcher,
    plan: RetryPlan,
}

impl Refresher {
    pub fn new(store: Arc<dyn CacheStore>, fetcher: RetryingFetcher, plan: RetryPlan) -> Self {
        Self { store, fetcher, plan }
    }

    /// Fetch the key's path and store an ok response tagged for `ttl`.
    ///
    /// A failed store write is logged and the fetched entry is still returned.
    pub async fn refresh(&self, key: &CacheKey, origins: &OriginSet, ttl: TtlPair) -> Result<Refresh, FetchError> {
        let response = self.fetcher.fetch(origins, key.path_and_query(), &self.plan).await?;
        if !response.is_ok() {
            return Ok(Refresh::Rejected(response));
        }

        let entry = CacheEntry::new(response.status, headers::storable(&response.headers), response.bytes)
            .with_ttl_headers(&ttl)
            .stamped(Utc::now());

        if let Err(e) = self.store.put(key, entry.clone()).await {
            tracing::warn!(key = %key, store = self.store.name(), error = %e, "cache write failed");
        }

        Ok(Refresh::Stored(entry))
    }
}
