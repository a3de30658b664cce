use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A dividend announcement from the dividend calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub symbol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ex-dividend date.
    pub event_date: NaiveDate,

    /// Cash amount per share.
    pub amount: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// An upcoming or recent listing from the IPO calendar.
///
/// Price and share figures are frequently not yet known when a listing is
/// first announced, so all of them are optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpoEvent {
    pub symbol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Expected listing date.
    pub event_date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range_low: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range_high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_price: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}
