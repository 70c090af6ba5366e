//! Freshness policy: per-resource TTL pairs and age classification.
//!
//! A cached entry moves through three windows as it ages:
//!
//! - `[0, fresh)`: served as-is, no origin traffic
//! - `[fresh, stale)`: served immediately, refreshed in the background
//! - `[stale, ∞)`: refetched synchronously, kept only as an error fallback
//!
//! The TTL pair is resolved from the last path segment of the request (the
//! resource's file name), falling back to a default pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Freshness and stale-while-revalidate windows, in seconds.
///
/// Invariant: `stale >= fresh`. Checked by config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPair {
    /// Seconds an entry is served without revalidation.
    pub fresh: u64,
    /// Seconds after storage at which an entry stops being served stale.
    pub stale: u64,
}

/// Classification of a cached entry's age against a [`TtlPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl TtlPair {
    pub const fn new(fresh: u64, stale: u64) -> Self {
        Self { fresh, stale }
    }

    /// Classify an entry age.
    ///
    /// `None` means the age could not be determined (missing or unparseable
    /// storage timestamp) and is treated as infinitely old.
    pub fn classify(&self, age: Option<u64>) -> Freshness {
        match age {
            Some(age) if age < self.fresh => Freshness::Fresh,
            Some(age) if age < self.stale => Freshness::Stale,
            _ => Freshness::Expired,
        }
    }

    /// Length of the stale-while-revalidate window.
    pub fn swr_window(&self) -> u64 {
        self.stale.saturating_sub(self.fresh)
    }

    /// `Cache-Control` value written on stored entries.
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}, stale-while-revalidate={}", self.fresh, self.swr_window())
    }

    /// `CDN-Cache-Control` value written on stored entries.
    pub fn cdn_cache_control(&self) -> String {
        format!("public, max-age={}", self.fresh)
    }

    /// Edge-specific cache-control value; lets the edge keep the entry for the whole stale window.
    pub fn edge_cache_control(&self) -> String {
        format!("public, max-age={}", self.stale)
    }
}

impl Default for TtlPair {
    fn default() -> Self {
        Self { fresh: 3600, stale: 7200 }
    }
}

/// Per-resource TTL table with a default pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    /// Pair used when the resource name has no explicit entry.
    #[serde(default)]
    pub default: TtlPair,

    /// TTL pairs keyed by resource file name (e.g. `commodities.json`).
    #[serde(default)]
    pub resources: BTreeMap<String, TtlPair>,
}

impl FreshnessPolicy {
    /// Resolve the TTL pair for a request path by its last segment.
    pub fn resolve(&self, path: &str) -> TtlPair {
        let name = resource_name(path);
        self.resources.get(name).copied().unwrap_or(self.default)
    }

    /// Iterate over every pair in the table, default first.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &TtlPair)> {
        std::iter::once(("default", &self.default)).chain(self.resources.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Last path segment, ignoring any query string.
fn resource_name(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}
