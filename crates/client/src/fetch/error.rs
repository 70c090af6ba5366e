//! Origin fetch error types.

/// Transport-level failures talking to an origin.
///
/// Non-2xx statuses are not errors: they come back as a
/// [`FetchResponse`](super::FetchResponse) so callers can decide whether
/// cached data can mask them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Request timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    Timeout(String),

    /// Connection, DNS or protocol failure.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    TooLarge(String),

    /// Origin URL could not be built.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed.
    #[error("CLIENT_ERROR: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_builder() {
            FetchError::Client(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<super::url::UrlError> for FetchError {
    fn from(err: super::url::UrlError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}
