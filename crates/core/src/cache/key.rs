//! Canonical cache key generation.

use std::fmt;

use http::Method;
use sha2::{Digest, Sha256};

/// Canonical identity of a cached item: method plus path and query.
///
/// `HEAD` is folded into `GET` so both share one entry. The query string is
/// kept verbatim (parameters are not reordered).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    canonical: String,
}

impl CacheKey {
    /// Build a key from request parts.
    pub fn new(method: &Method, path: &str, query: Option<&str>) -> Self {
        let method = if *method == Method::HEAD { "GET" } else { method.as_str() };
        let path = if path.is_empty() { "/" } else { path };

        let canonical = match query {
            Some(q) if !q.is_empty() => format!("{method} {path}?{q}"),
            _ => format!("{method} {path}"),
        };

        Self { canonical }
    }

    /// The canonical `"<METHOD> <path>[?query]"` string.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Path and query portion of the key, as forwarded to the origin.
    pub fn path_and_query(&self) -> &str {
        self.canonical.split_once(' ').map(|(_, rest)| rest).unwrap_or(&self.canonical)
    }

    /// Content address of the key (SHA-256, hex encoded).
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
