//! Origin URL handling.

/// Error type for origin URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an origin base URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Drop fragment and query
/// 5. Trim trailing `/` from the path
pub fn canonicalize_origin(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return Err(UrlError::InvalidUrl("missing host".to_string()));
    };
    parsed.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);
    parsed.set_query(None);

    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);

    Ok(parsed)
}

/// Build the URL of a request path on an origin.
///
/// The path is appended to the base path verbatim, so a base of
/// `https://api.example.com/v1` and `/cache/a.json?x=1` gives
/// `https://api.example.com/v1/cache/a.json?x=1`.
pub fn origin_url(base: &url::Url, path_and_query: &str) -> Result<url::Url, UrlError> {
    let mut joined = base.as_str().trim_end_matches('/').to_string();
    if !path_and_query.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(path_and_query);

    url::Url::parse(&joined).map_err(|e| UrlError::InvalidUrl(e.to_string()))
}
