//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn validate_origin(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { field: field.into(), hint: format!("Set STALEGATE_{}", field.to_uppercase()) });
    }

    let url = url::Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(field, format!("unsupported scheme: {scheme}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid(field, "must include a host"));
    }

    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - an origin URL is not an absolute http(s) URL
    /// - `cache_prefix` does not start and end with `/`
    /// - any TTL pair has `fresh == 0` or `stale < fresh`
    /// - the retry plan shrinks (`backoff_multiplier < 1`) or `initial_delay_ms > max_delay_ms`
    /// - `max_attempts` exceeds 10
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `memory_capacity_bytes` is smaller than `max_bytes`
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_origin("origin_url", &self.origin_url)?;
        if let Some(failover) = &self.failover_url {
            validate_origin("failover_url", failover)?;
        }

        if !self.cache_prefix.starts_with('/') || !self.cache_prefix.ends_with('/') || self.cache_prefix.len() < 2 {
            return Err(invalid("cache_prefix", "must start and end with '/' (e.g. /cache/)"));
        }

        for (name, pair) in self.ttl.pairs() {
            if pair.fresh == 0 {
                return Err(invalid(format!("ttl.{name}"), "fresh must be greater than 0"));
            }
            if pair.stale < pair.fresh {
                return Err(invalid(format!("ttl.{name}"), "stale must not be less than fresh"));
            }
        }

        let retry = &self.retry;
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(invalid("retry.backoff_multiplier", "must be a finite value of at least 1.0"));
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(invalid("retry.initial_delay_ms", "must not exceed retry.max_delay_ms"));
        }
        if retry.max_attempts > 10 {
            return Err(invalid("retry.max_attempts", "must not exceed 10"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.memory_capacity_bytes < self.max_bytes as u64 {
            return Err(invalid("memory_capacity_bytes", "must hold at least one max_bytes response"));
        }

        if self.failover_url.as_deref() == Some(self.origin_url.as_str()) {
            tracing::warn!(origin = %self.origin_url, "failover_url equals origin_url; failover adds no redundancy");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TtlPair;
    use crate::retry::RetryPlan;

    fn field_of(result: Result<(), ConfigError>) -> Option<String> {
        match result {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin_url: "ftp://origin.example.com".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("origin_url"));
    }

    #[test]
    fn test_validate_origin_missing() {
        let config = AppConfig { origin_url: "  ".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_validate_failover_url() {
        let config = AppConfig { failover_url: Some("not a url".into()), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("failover_url"));

        let config = AppConfig { failover_url: Some("https://backup.example.com".into()), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_cache_prefix() {
        for prefix in ["cache/", "/cache", "/", ""] {
            let config = AppConfig { cache_prefix: prefix.into(), ..Default::default() };
            assert_eq!(field_of(config.validate()).as_deref(), Some("cache_prefix"), "prefix {prefix:?}");
        }
    }

    #[test]
    fn test_validate_stale_before_fresh() {
        let mut config = AppConfig::default();
        config.ttl.resources.insert("galnet-news.json".into(), TtlPair::new(7200, 3600));
        assert_eq!(field_of(config.validate()).as_deref(), Some("ttl.galnet-news.json"));
    }

    #[test]
    fn test_validate_zero_fresh() {
        let mut config = AppConfig::default();
        config.ttl.default = TtlPair::new(0, 60);
        assert_eq!(field_of(config.validate()).as_deref(), Some("ttl.default"));
    }

    #[test]
    fn test_validate_equal_fresh_and_stale() {
        let mut config = AppConfig::default();
        config.ttl.default = TtlPair::new(60, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_shrinking_backoff() {
        let config = AppConfig { retry: RetryPlan { backoff_multiplier: 0.5, ..Default::default() }, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.backoff_multiplier"));
    }

    #[test]
    fn test_validate_initial_exceeds_max_delay() {
        let config = AppConfig {
            retry: RetryPlan { initial_delay_ms: 2000, max_delay_ms: 1000, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.initial_delay_ms"));
    }

    #[test]
    fn test_validate_too_many_attempts() {
        let config = AppConfig { retry: RetryPlan { max_attempts: 11, ..Default::default() }, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.max_attempts"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("user_agent"));
    }

    #[test]
    fn test_validate_memory_capacity_below_max_bytes() {
        let config = AppConfig { max_bytes: 2048, memory_capacity_bytes: 1024, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("memory_capacity_bytes"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, ..Default::default() }; // minimum valid values
        assert!(config.validate().is_ok());
    }
}
