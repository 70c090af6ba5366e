//! Response header layering.
//!
//! Every proxied response is built from three header sources, later layers
//! overriding earlier ones by name:
//!
//! 1. stored: headers of the cached entry or origin response
//! 2. standard: CORS, security and proxy identity headers
//! 3. diagnostics: `X-Cache`, `X-Cache-Status`, `Age`, `Warning`

use std::sync::LazyLock;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use stalegate_client::fetch::is_hop_by_hop;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

/// Where the response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XCache {
    Hit,
    Miss,
    Bypass,
    Passthrough,
}

impl XCache {
    pub fn as_str(&self) -> &'static str {
        match self {
            XCache::Hit => "HIT",
            XCache::Miss => "MISS",
            XCache::Bypass => "BYPASS",
            XCache::Passthrough => "PASSTHROUGH",
        }
    }
}

/// Freshness of what was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Stale,
    Updated,
    StaleError,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Updated => "updated",
            CacheStatus::StaleError => "stale-error",
        }
    }
}

/// HTTP `Warning` values attached to degraded responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Served inside the stale window.
    Stale,
    /// Served after the origin failed.
    RevalidationFailed,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Warning::Stale => r#"110 - "Response is Stale""#,
            Warning::RevalidationFailed => r#"111 - "Revalidation Failed""#,
        }
    }
}

/// Per-response cache annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub cache: XCache,
    pub status: Option<CacheStatus>,
    pub age: Option<u64>,
    pub warning: Option<Warning>,
}

impl Diagnostics {
    pub fn fresh(age: Option<u64>) -> Self {
        Self { cache: XCache::Hit, status: Some(CacheStatus::Fresh), age, warning: None }
    }

    pub fn stale(age: Option<u64>) -> Self {
        Self { cache: XCache::Hit, status: Some(CacheStatus::Stale), age, warning: Some(Warning::Stale) }
    }

    pub fn updated() -> Self {
        Self { cache: XCache::Miss, status: Some(CacheStatus::Updated), age: None, warning: None }
    }

    /// Expired or unknown-age entry served because the origin failed.
    pub fn stale_error(age: Option<u64>) -> Self {
        Self {
            cache: XCache::Hit,
            status: Some(CacheStatus::StaleError),
            age,
            warning: Some(Warning::RevalidationFailed),
        }
    }

    pub fn bypass() -> Self {
        Self { cache: XCache::Bypass, status: None, age: None, warning: None }
    }

    pub fn passthrough() -> Self {
        Self { cache: XCache::Passthrough, status: None, age: None, warning: None }
    }

    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(X_CACHE, HeaderValue::from_static(self.cache.as_str()));
        if let Some(status) = self.status {
            headers.insert(X_CACHE_STATUS, HeaderValue::from_static(status.as_str()));
        }
        if let Some(age) = self.age {
            headers.insert(header::AGE, HeaderValue::from(age));
        }
        if let Some(warning) = self.warning {
            headers.insert(header::WARNING, HeaderValue::from_static(warning.as_str()));
        }
        headers
    }
}

static STANDARD: LazyLock<HeaderMap> = LazyLock::new(|| {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        ("access-control-allow-origin", "*"),
        ("access-control-allow-methods", "GET, HEAD, OPTIONS"),
        ("access-control-allow-headers", "Content-Type, If-None-Match, Accept-Encoding"),
        ("access-control-max-age", "86400"),
        ("access-control-expose-headers", "ETag, X-Cache, X-Cache-Status, X-Response-Time"),
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("x-xss-protection", "1; mode=block"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
        ("x-powered-by", "stalegate"),
        ("x-proxy-version", env!("CARGO_PKG_VERSION")),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers
});

/// CORS, security and proxy identity headers carried by every response.
pub fn standard() -> &'static HeaderMap {
    &STANDARD
}

/// Replace every header named in `layer`, keeping multi-valued headers intact.
fn overlay(base: &mut HeaderMap, layer: &HeaderMap) {
    for name in layer.keys() {
        base.remove(name);
        for value in layer.get_all(name) {
            base.append(name.clone(), value.clone());
        }
    }
}

/// Merge the three header layers into a new map.
pub fn compose(stored: &HeaderMap, standard: &HeaderMap, diagnostics: &Diagnostics) -> HeaderMap {
    let mut headers = stored.clone();
    overlay(&mut headers, standard);
    overlay(&mut headers, &diagnostics.to_headers());
    headers
}

/// Origin headers that may be stored and replayed.
///
/// Connection-scoped headers go, as do length and encoding: the body is
/// stored decoded and its length is set when it is sent.
pub fn storable(origin: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(origin.len());
    for (name, value) in origin {
        if is_hop_by_hop(name) || *name == header::CONTENT_LENGTH || *name == header::CONTENT_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        headers.insert("x-powered-by", HeaderValue::from_static("origin-framework"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers
    }

    #[test]
    fn test_diagnostics_fresh() {
        let headers = Diagnostics::fresh(Some(1800)).to_headers();
        assert_eq!(headers[X_CACHE], "HIT");
        assert_eq!(headers[X_CACHE_STATUS], "fresh");
        assert_eq!(headers[header::AGE], "1800");
        assert!(!headers.contains_key(header::WARNING));
    }

    #[test]
    fn test_diagnostics_stale() {
        let headers = Diagnostics::stale(Some(5000)).to_headers();
        assert_eq!(headers[X_CACHE_STATUS], "stale");
        assert_eq!(headers[header::WARNING], r#"110 - "Response is Stale""#);
    }

    #[test]
    fn test_diagnostics_stale_error_without_age() {
        let headers = Diagnostics::stale_error(None).to_headers();
        assert_eq!(headers[X_CACHE], "HIT");
        assert_eq!(headers[X_CACHE_STATUS], "stale-error");
        assert_eq!(headers[header::WARNING], r#"111 - "Revalidation Failed""#);
        assert!(!headers.contains_key(header::AGE));
    }

    #[test]
    fn test_diagnostics_bypass_and_passthrough() {
        let bypass = Diagnostics::bypass().to_headers();
        assert_eq!(bypass[X_CACHE], "BYPASS");
        assert!(!bypass.contains_key(X_CACHE_STATUS));

        assert_eq!(Diagnostics::passthrough().to_headers()[X_CACHE], "PASSTHROUGH");
    }

    #[test]
    fn test_compose_later_layers_win() {
        let headers = compose(&stored(), standard(), &Diagnostics::fresh(Some(10)));

        assert_eq!(headers[X_CACHE], "HIT");
        assert_eq!(headers["x-powered-by"], "stalegate");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_compose_leaves_stored_untouched() {
        let original = stored();
        let _ = compose(&original, standard(), &Diagnostics::updated());
        assert_eq!(original[X_CACHE], "MISS");
        assert!(!original.contains_key("access-control-allow-origin"));
    }

    #[test]
    fn test_storable_strips_connection_headers() {
        let mut origin = stored();
        origin.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        origin.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        origin.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        origin.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let headers = storable(&origin);
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert!(!headers.contains_key(header::CONTENT_ENCODING));
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_standard_headers() {
        let headers = standard();
        assert_eq!(headers["access-control-allow-methods"], "GET, HEAD, OPTIONS");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-proxy-version"], env!("CARGO_PKG_VERSION"));
    }
}
