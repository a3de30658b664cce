//! Retry policy with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// How transient gateway failures are retried.
///
/// The delay before retry `n` (0-based) is `backoff_base * backoff_factor^n`,
/// capped at `backoff_max`. Total gateway attempts are `max_retries + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub backoff_base: Duration,
    pub backoff_factor: u32,
    #[serde(with = "duration_ms")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_factor: 2,
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before the retry following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let scale = self.backoff_factor.max(1).saturating_pow(attempt);
        self.backoff_base
            .checked_mul(scale)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}
