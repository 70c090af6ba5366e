//! HTTP access to origins.
//!
//! ### Origin requests
//! - `User-Agent`, `Accept: application/json` and `X-Forwarded-By` on every GET
//! - Per-attempt timeout, max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Non-2xx statuses come back as responses; only transport failures are errors
//!
//! ### Passthrough
//! [`OriginClient::forward`] relays an arbitrary request with hop-by-hop
//! headers removed and no retry. Redirects are not followed: a 3xx from the
//! origin goes back to the caller as-is.

pub mod error;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode, Url};
use std::time::{Duration, Instant};

pub use error::FetchError;
pub use url::{UrlError, canonicalize_origin, origin_url};

use stalegate_core::AppConfig;

const X_FORWARDED_BY: HeaderName = HeaderName::from_static("x-forwarded-by");

/// Headers that describe a single connection and must not be relayed.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header is connection-scoped.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Configuration for the origin client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "stalegate/<version>")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Per-attempt request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("stalegate/{}", env!("CARGO_PKG_VERSION")),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Response from an origin.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// 2xx or 3xx.
    pub fn is_ok(&self) -> bool {
        self.status.is_success() || self.status.is_redirection()
    }

    /// Server error or rate limited.
    pub fn is_retryable(&self) -> bool {
        self.status.is_server_error() || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// A source of origin responses.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET a URL once.
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// HTTP client for origins.
pub struct OriginClient {
    http: Client,
    relay: Client,
    config: FetchConfig,
}

fn build_client(config: &FetchConfig, redirect: Policy) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout)
        .redirect(redirect)
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| FetchError::Client(format!("failed to build HTTP client: {e}")))
}

impl OriginClient {
    /// Create a new origin client with the given configuration.
    ///
    /// Cached GETs follow up to `max_redirects` redirects; relayed requests
    /// follow none.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = build_client(&config, Policy::limited(config.max_redirects))?;
        let relay = build_client(&config, Policy::none())?;

        Ok(Self { http, relay, config })
    }

    /// Relay a request to an origin unchanged, once.
    ///
    /// Hop-by-hop headers and `Host` are dropped; the client sets its own.
    pub async fn forward(
        &self, method: Method, url: Url, headers: &HeaderMap, body: Bytes,
    ) -> Result<FetchResponse, FetchError> {
        let mut outgoing = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if *name != header::HOST && !is_hop_by_hop(name) {
                outgoing.append(name.clone(), value.clone());
            }
        }

        let request = self.relay.request(method, url.clone()).headers(outgoing).body(body);
        self.execute(url, request).await
    }

    async fn execute(&self, url: Url, request: reqwest::RequestBuilder) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let response = request.send().await?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(%url, status = status.as_u16(), fetch_ms, bytes = bytes.len(), "origin responded");

        Ok(FetchResponse { url, status, headers, bytes, fetch_ms })
    }
}

#[async_trait]
impl Upstream for OriginClient {
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let request = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .header(X_FORWARDED_BY, HeaderValue::from_static("stalegate"));

        self.execute(url.clone(), request).await
    }
}
