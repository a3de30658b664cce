//! Construction-time configuration for [`MarketDataClient`](crate::MarketDataClient).
//!
//! The client does not read the environment itself; the embedding application
//! builds a [`MarketDataConfig`] (the server does it from `MD_*` variables) and
//! hands it over at startup.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlPolicy;
use crate::client::RetryPolicy;
use crate::errors::MarketDataError;
use crate::rate_limiter::RateLimitConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

/// Provider endpoint and credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Per-call HTTP timeout.
    #[serde(with = "duration_ms")]
    pub http_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Cache sizing and expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub capacity: usize,
    #[serde(flatten)]
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            ttl: TtlPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    /// Longest a request may wait for a rate slot before failing with
    /// `RateLimitExceeded`.
    #[serde(with = "duration_ms")]
    pub max_rate_limit_wait: Duration,
    /// Deadline for the whole cache-check-to-return path.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            rate_limit: RateLimitConfig::default(),
            max_rate_limit_wait: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl MarketDataConfig {
    /// Reject settings the client cannot honour.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let invalid = |msg: &str| Err(MarketDataError::InvalidQuery(format!("config: {msg}")));

        if self.provider.base_url.trim().is_empty() {
            return invalid("provider base_url is empty");
        }
        if self.rate_limit.quota == 0 {
            return invalid("rate_limit quota must be at least 1");
        }
        if self.rate_limit.window.is_zero() {
            return invalid("rate_limit window must be positive");
        }
        if self.request_timeout.is_zero() {
            return invalid("request_timeout must be positive");
        }
        if self.cache.capacity == 0 {
            return invalid("cache capacity must be at least 1");
        }
        Ok(())
    }
}

/// Serde helper: `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde helper: `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
