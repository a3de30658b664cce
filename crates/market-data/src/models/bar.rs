use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
///
/// `timestamp` is the exchange-local open time of the bar, exactly as the
/// provider reports it. Fields the provider omitted (volume for FX pairs,
/// for instance) are `None`; `close` is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesBar {
    pub timestamp: NaiveDateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    pub close: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl TimeSeriesBar {
    /// Create a bar with only the required fields.
    pub fn new(timestamp: NaiveDateTime, close: Decimal) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// Create a full OHLCV bar.
    pub fn ohlcv(
        timestamp: NaiveDateTime,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(volume),
        }
    }
}
