//! Provider gateway trait definitions.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{CalendarQuery, QuoteQuery};

/// Undecoded JSON body returned by a provider.
///
/// The gateway only guarantees that the body parsed as JSON and was not an
/// error document; its shape is checked by the normalizer.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPayload {
    body: Value,
}

impl RawPayload {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_inner(self) -> Value {
        self.body
    }
}

impl From<Value> for RawPayload {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

/// Network boundary to the market data provider.
///
/// Implementations perform exactly one HTTP exchange per call and never retry;
/// retries and rate accounting belong to the client. Failures are either
/// [`MarketDataError::Network`] or [`MarketDataError::Provider`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use marketdesk_market_data::provider::{ProviderGateway, RawPayload};
///
/// struct FixtureGateway;
///
/// #[async_trait]
/// impl ProviderGateway for FixtureGateway {
///     async fn fetch_series(&self, _query: &QuoteQuery) -> Result<RawPayload, MarketDataError> {
///         Ok(RawPayload::new(serde_json::json!({"status": "ok", "values": []})))
///     }
///
///     async fn fetch_calendar(&self, _query: &CalendarQuery) -> Result<RawPayload, MarketDataError> {
///         Ok(RawPayload::new(serde_json::json!([])))
///     }
/// }
/// ```
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &'static str {
        "PROVIDER"
    }

    /// Fetch a time series.
    async fn fetch_series(&self, query: &QuoteQuery) -> Result<RawPayload, MarketDataError>;

    /// Fetch the dividend or IPO calendar for one day.
    async fn fetch_calendar(&self, query: &CalendarQuery) -> Result<RawPayload, MarketDataError>;
}
