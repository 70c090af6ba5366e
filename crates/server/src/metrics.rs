//! Request outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Something the proxy did that is worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    FreshHit,
    StaleHit,
    Miss,
    StaleError,
    Bypass,
    Passthrough,
    RevalidationStarted,
    RevalidationFailed,
    UpstreamError,
}

/// Process-wide counters, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct Metrics {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    stale_errors: AtomicU64,
    bypasses: AtomicU64,
    passthroughs: AtomicU64,
    revalidations_started: AtomicU64,
    revalidations_failed: AtomicU64,
    upstream_errors: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub stale_errors: u64,
    pub bypasses: u64,
    pub passthroughs: u64,
    pub revalidations_started: u64,
    pub revalidations_failed: u64,
    pub upstream_errors: u64,
}

impl Metrics {
    pub fn record(&self, event: CacheEvent) {
        let counter = match event {
            CacheEvent::FreshHit => &self.fresh_hits,
            CacheEvent::StaleHit => &self.stale_hits,
            CacheEvent::Miss => &self.misses,
            CacheEvent::StaleError => &self.stale_errors,
            CacheEvent::Bypass => &self.bypasses,
            CacheEvent::Passthrough => &self.passthroughs,
            CacheEvent::RevalidationStarted => &self.revalidations_started,
            CacheEvent::RevalidationFailed => &self.revalidations_failed,
            CacheEvent::UpstreamError => &self.upstream_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            fresh_hits: load(&self.fresh_hits),
            stale_hits: load(&self.stale_hits),
            misses: load(&self.misses),
            stale_errors: load(&self.stale_errors),
            bypasses: load(&self.bypasses),
            passthroughs: load(&self.passthroughs),
            revalidations_started: load(&self.revalidations_started),
            revalidations_failed: load(&self.revalidations_failed),
            upstream_errors: load(&self.upstream_errors),
        }
    }
}
