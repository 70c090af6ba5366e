//! Origin access for stalegate.
//!
//! This crate provides the HTTP client used to reach origins, the retrying
//! fetcher with failover, and origin URL handling shared by the server.

pub mod fetch;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fetch::{FetchConfig, FetchError, FetchResponse, OriginClient, Upstream};
pub use retry::{OriginSet, RetryingFetcher};
