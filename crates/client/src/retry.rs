//! Bounded retry with failover across origins.
//!
//! Each logical fetch starts on the primary origin. The first retryable
//! failure switches to the failover origin, when one is configured, with the
//! attempt counter reset to zero and no sleep. Every later failure sleeps
//! `RetryPlan::delay(attempt)` and retries the current origin until
//! `max_attempts` is spent. The failover is entered at most once per call, so
//! cumulative backoff never exceeds `max_attempts * max_delay`.

use std::sync::Arc;

use reqwest::Url;
use stalegate_core::{AppConfig, RetryPlan};

use crate::fetch::{FetchError, FetchResponse, Upstream, UrlError, canonicalize_origin, origin_url};

/// Primary origin and optional failover, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSet {
    pub primary: Url,
    pub failover: Option<Url>,
}

impl OriginSet {
    pub fn new(primary: &str, failover: Option<&str>) -> Result<Self, UrlError> {
        Ok(Self { primary: canonicalize_origin(primary)?, failover: failover.map(canonicalize_origin).transpose()? })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, UrlError> {
        Self::new(&config.origin_url, config.failover_url.as_deref())
    }
}

/// Position within one logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttemptState {
    attempt: u32,
    using_failover: bool,
}

impl AttemptState {
    const START: Self = Self { attempt: 0, using_failover: false };

    fn retry(self) -> Self {
        Self { attempt: self.attempt + 1, ..self }
    }

    fn fail_over(self) -> Self {
        Self { attempt: 0, using_failover: true }
    }
}

/// Fetches from an [`OriginSet`] with backoff and failover.
#[derive(Clone)]
pub struct RetryingFetcher {
    upstream: Arc<dyn Upstream>,
}

impl RetryingFetcher {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// GET `path_and_query` from the origins.
    ///
    /// Returns the first non-retryable response. When every attempt failed,
    /// returns the last retryable response received, or the last transport
    /// error if no attempt produced a response at all.
    ///
    /// # Errors
    ///
    /// `FetchError::InvalidUrl` if the path cannot be joined to an origin, or
    /// the final transport error when no origin ever answered.
    pub async fn fetch(
        &self, origins: &OriginSet, path_and_query: &str, plan: &RetryPlan,
    ) -> Result<FetchResponse, FetchError> {
        let mut state = AttemptState::START;
        let mut last_response: Option<FetchResponse> = None;
        let mut last_error: Option<FetchError> = None;

        loop {
            let base = match (&origins.failover, state.using_failover) {
                (Some(failover), true) => failover,
                _ => &origins.primary,
            };
            let url = origin_url(base, path_and_query)?;

            match self.upstream.get(&url).await {
                Ok(response) if !response.is_retryable() => return Ok(response),
                Ok(response) => {
                    tracing::debug!(%url, attempt = state.attempt, status = response.status.as_u16(), "retryable origin status");
                    last_response = Some(response);
                }
                Err(e) => {
                    tracing::debug!(%url, attempt = state.attempt, error = %e, "origin transport failure");
                    last_error = Some(e);
                }
            }

            if !state.using_failover && origins.failover.is_some() {
                tracing::warn!(primary = %origins.primary, path = path_and_query, "primary origin failed, switching to failover");
                state = state.fail_over();
            } else if state.attempt < plan.max_attempts {
                tokio::time::sleep(plan.delay(state.attempt)).await;
                state = state.retry();
            } else {
                break;
            }
        }

        match (last_response, last_error) {
            (Some(response), _) => Ok(response),
            (None, Some(e)) => Err(e),
            (None, None) => Err(FetchError::Network("no attempt was made".to_string())),
        }
    }
}
