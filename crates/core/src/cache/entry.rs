//! Cached origin responses.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;

use crate::policy::TtlPair;

/// Header carrying the storage timestamp of an entry (RFC 3339).
pub const X_CACHE_TIME: HeaderName = HeaderName::from_static("x-cache-time");

const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");
const EDGE_CACHE_CONTROL: HeaderName = HeaderName::from_static("cloudflare-cdn-cache-control");

/// A stored origin response.
///
/// Entries are values: every modification returns a new entry, so a response
/// built from a stored entry never changes what the store holds.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// When the entry was written. `None` if the timestamp was never set or
    /// could not be decoded; such entries have no computable age.
    pub stored_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create an unstamped entry.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into(), stored_at: None }
    }

    /// Age in whole seconds at `now`.
    ///
    /// Returns `None` when the entry has no storage timestamp. A timestamp in
    /// the future (clock skew between writers) yields an age of zero.
    pub fn age(&self, now: DateTime<Utc>) -> Option<u64> {
        let stored_at = self.stored_at?;
        let seconds = now.signed_duration_since(stored_at).num_seconds();
        Some(seconds.max(0) as u64)
    }

    /// Copy of this entry stamped with a storage time, including the `X-Cache-Time` header.
    pub fn stamped(&self, now: DateTime<Utc>) -> Self {
        let mut entry = self.clone();
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Ok(value) = HeaderValue::from_str(&stamp) {
            entry.headers.insert(X_CACHE_TIME, value);
        }
        entry.stored_at = Some(now);
        entry
    }

    /// Copy of this entry carrying cache-control directives for `ttl`.
    pub fn with_ttl_headers(&self, ttl: &TtlPair) -> Self {
        let mut entry = self.clone();
        for (name, value) in [
            (CACHE_CONTROL, ttl.cache_control()),
            (CDN_CACHE_CONTROL, ttl.cdn_cache_control()),
            (EDGE_CACHE_CONTROL, ttl.edge_cache_control()),
        ] {
            if let Ok(value) = HeaderValue::from_str(&value) {
                entry.headers.insert(name, value);
            }
        }
        entry
    }
}
