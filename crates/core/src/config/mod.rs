//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STALEGATE_*)
//! 2. TOML config file (if STALEGATE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The resulting value is built once at startup and shared immutably.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::FreshnessPolicy;
use crate::retry::RetryPlan;

mod validation;

pub use validation::ConfigError;

/// Cache store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Bounded in-process cache. Lost on restart.
    Memory,
    /// SQLite file at `db_path`.
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STALEGATE_*)
/// 2. TOML config file (if STALEGATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the proxy listens on.
    ///
    /// Set via STALEGATE_BIND environment variable.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Primary origin base URL.
    ///
    /// Set via STALEGATE_ORIGIN_URL environment variable.
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// Failover origin base URL, switched to once per fetch after the primary fails.
    ///
    /// Set via STALEGATE_FAILOVER_URL environment variable.
    #[serde(default)]
    pub failover_url: Option<String>,

    /// Path prefix of cacheable requests.
    ///
    /// Set via STALEGATE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Fresh/stale TTL table.
    ///
    /// Nested keys: STALEGATE_TTL__DEFAULT__FRESH, STALEGATE_TTL__DEFAULT__STALE.
    #[serde(default)]
    pub ttl: FreshnessPolicy,

    /// Origin retry plan.
    ///
    /// Nested keys: STALEGATE_RETRY__MAX_ATTEMPTS, STALEGATE_RETRY__INITIAL_DELAY_MS, ...
    #[serde(default)]
    pub retry: RetryPlan,

    /// User-Agent string for origin requests.
    ///
    /// Set via STALEGATE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-attempt origin request timeout in milliseconds.
    ///
    /// Set via STALEGATE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum origin response body size in bytes.
    ///
    /// Set via STALEGATE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Cache store backend.
    ///
    /// Set via STALEGATE_STORE environment variable (`memory` or `sqlite`).
    #[serde(default = "default_store")]
    pub store: StoreBackend,

    /// Path to SQLite cache database (sqlite backend only).
    ///
    /// Set via STALEGATE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Capacity of the in-memory store, in bytes of cached responses.
    ///
    /// Set via STALEGATE_MEMORY_CAPACITY_BYTES environment variable.
    #[serde(default = "default_memory_capacity_bytes")]
    pub memory_capacity_bytes: u64,

    /// Whether the `/metrics` endpoint is served.
    ///
    /// Set via STALEGATE_ENABLE_METRICS environment variable.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Deployment environment name reported by `/health`.
    ///
    /// Set via STALEGATE_ENVIRONMENT environment variable.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Endpoint receiving internal error reports as JSON.
    ///
    /// Set via STALEGATE_ERROR_SINK_URL environment variable.
    #[serde(default)]
    pub error_sink_url: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8787".into()
}

fn default_origin_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_cache_prefix() -> String {
    "/cache/".into()
}

fn default_user_agent() -> String {
    format!("stalegate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_store() -> StoreBackend {
    StoreBackend::Memory
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stalegate-cache.sqlite")
}

fn default_memory_capacity_bytes() -> u64 {
    268_435_456 // 256MB
}

fn default_environment() -> String {
    "production".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            origin_url: default_origin_url(),
            failover_url: None,
            cache_prefix: default_cache_prefix(),
            ttl: FreshnessPolicy::default(),
            retry: RetryPlan::default(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            store: default_store(),
            db_path: default_db_path(),
            memory_capacity_bytes: default_memory_capacity_bytes(),
            enable_metrics: false,
            environment: default_environment(),
            error_sink_url: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a request path falls under the cache prefix.
    pub fn is_cacheable_path(&self, path: &str) -> bool {
        path.starts_with(&self.cache_prefix)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STALEGATE_`
    /// 2. TOML file from `STALEGATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STALEGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STALEGATE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(&figment)
    }

    /// Extract and validate configuration from an assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
