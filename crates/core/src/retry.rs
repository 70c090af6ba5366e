//! Retry plan with capped exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential-backoff retry plan for a single origin.
///
/// `delay(attempt) = min(initial_delay * backoff_multiplier^attempt, max_delay)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPlan {
    /// Retries allowed after the first attempt on one origin.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt. Must be at least 1.0.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPlan {
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay to sleep before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let max = self.max_delay();
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay_ms as f64 * factor;

        if !millis.is_finite() || millis >= self.max_delay_ms as f64 {
            return max;
        }

        Duration::from_nanos((millis.max(0.0) * 1_000_000.0).round() as u64).min(max)
    }

    /// Sum of all backoff sleeps one fetch can incur, failover included.
    pub fn worst_case(&self) -> Duration {
        (0..self.max_attempts).map(|attempt| self.delay(attempt)).sum()
    }
}
