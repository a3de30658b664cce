//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// The type is `Clone` because one failed fetch is delivered to every caller
/// that was coalesced onto it.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines whether the client retries the gateway call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Connection-level failure talking to the provider.
    /// Retried locally with backoff.
    #[error("Network error: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// The provider answered, but not with usable data (non-2xx status,
    /// an error document, or a body that is not JSON).
    #[error("Provider error{}: {message}", describe_status(.status, .code))]
    Provider {
        /// HTTP status, when the failure came from the status line
        status: Option<u16>,
        /// Provider-level error code from the response body
        code: Option<i64>,
        /// The error message from the provider
        message: String,
    },

    /// The payload is structurally invalid for normalization.
    /// Results that fail here are never cached.
    #[error("Unexpected data shape: {message}")]
    DataShape {
        /// Which field or row was missing or mistyped
        message: String,
    },

    /// Acquiring a rate slot would take longer than the configured maximum wait.
    #[error("Rate limit exceeded, next slot in {wait:?}")]
    RateLimitExceeded {
        /// Time until the next slot frees up
        wait: Duration,
    },

    /// The whole request exceeded its deadline.
    #[error("Timed out after {elapsed:?}")]
    Timeout {
        /// The deadline that was exceeded
        elapsed: Duration,
    },

    /// The query was rejected before touching the cache or the provider.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

fn describe_status(status: &Option<u16>, code: &Option<i64>) -> String {
    match (*status, *code) {
        (Some(status), Some(code)) => format!(" (HTTP {status}, code {code})"),
        (Some(status), None) => format!(" (HTTP {status})"),
        (None, Some(code)) => format!(" (code {code})"),
        (None, None) => String::new(),
    }
}

impl MarketDataError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape {
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketdesk_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::network("connection reset");
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::data_shape("values[3].close missing");
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network { .. } => RetryClass::WithBackoff,

            Self::Provider { .. }
            | Self::DataShape { .. }
            | Self::RateLimitExceeded { .. }
            | Self::Timeout { .. }
            | Self::InvalidQuery(_) => RetryClass::Never,
        }
    }
}
