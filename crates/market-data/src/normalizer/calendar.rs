use serde_json::{Map, Value};

use super::decode::{parse_date, Row};
use crate::errors::MarketDataError;
use crate::models::{DividendEvent, IpoEvent};
use crate::provider::RawPayload;

/// Recognised layouts of a dividend calendar body.
#[derive(Debug)]
pub(crate) enum DividendShape<'a> {
    /// `[{...}, ...]`
    List(&'a [Value]),
    /// `{"dividends": [{...}, ...]}`
    Wrapped(&'a [Value]),
    Unrecognized,
}

impl<'a> DividendShape<'a> {
    pub(crate) fn classify(body: &'a Value) -> Self {
        if let Some(rows) = body.as_array() {
            return DividendShape::List(rows);
        }
        match body.get("dividends").and_then(Value::as_array) {
            Some(rows) => DividendShape::Wrapped(rows),
            None => DividendShape::Unrecognized,
        }
    }
}

/// Recognised layouts of an IPO calendar body.
#[derive(Debug)]
pub(crate) enum IpoShape<'a> {
    /// `{"2024-05-01": [{...}], ...}` keyed by listing date.
    ByDate(&'a Map<String, Value>),
    /// `[{...}, ...]` with a `date` on every row.
    List(&'a [Value]),
    Unrecognized,
}

impl<'a> IpoShape<'a> {
    pub(crate) fn classify(body: &'a Value) -> Self {
        match body {
            Value::Array(rows) => IpoShape::List(rows),
            Value::Object(map) if map.keys().all(|k| parse_date(k).is_some()) => IpoShape::ByDate(map),
            _ => IpoShape::Unrecognized,
        }
    }
}

/// Convert a dividend calendar body into events ordered by date, then symbol.
///
/// `symbol`, `ex_date` and `amount` are required on every row.
pub fn normalize_dividends(payload: &RawPayload) -> Result<Vec<DividendEvent>, MarketDataError> {
    let (rows, prefix) = match DividendShape::classify(payload.body()) {
        DividendShape::List(rows) => (rows, ""),
        DividendShape::Wrapped(rows) => (rows, "dividends"),
        DividendShape::Unrecognized => {
            return Err(MarketDataError::data_shape(
                "dividend calendar body is neither a list nor a `dividends` object",
            ))
        }
    };

    let mut events = rows
        .iter()
        .enumerate()
        .map(|(i, value)| decode_dividend(&Row::new(value, format!("{}[{}]", prefix, i))?))
        .collect::<Result<Vec<_>, _>>()?;

    events.sort_by(|a, b| (a.event_date, &a.symbol).cmp(&(b.event_date, &b.symbol)));
    Ok(events)
}

fn decode_dividend(row: &Row<'_>) -> Result<DividendEvent, MarketDataError> {
    Ok(DividendEvent {
        symbol: row.required_str("symbol")?.to_string(),
        name: row.optional_string("name"),
        event_date: row.required_date("ex_date")?,
        amount: row.required_decimal("amount")?,
        dividend_yield: row.optional_decimal("yield")?,
        payment_date: row.optional_date("payment_date")?,
        exchange: row.optional_string("exchange"),
        currency: row.optional_string("currency"),
    })
}

/// Convert an IPO calendar body into events ordered by date, then symbol.
///
/// `symbol` and the listing date are required; every figure is optional.
pub fn normalize_ipos(payload: &RawPayload) -> Result<Vec<IpoEvent>, MarketDataError> {
    let mut events = Vec::new();

    match IpoShape::classify(payload.body()) {
        IpoShape::ByDate(days) => {
            for (day, rows) in days {
                let listed_on = parse_date(day)
                    .ok_or_else(|| MarketDataError::data_shape(format!("invalid IPO date key {}", day)))?;
                let rows = rows.as_array().ok_or_else(|| {
                    MarketDataError::data_shape(format!("{} is not a list of IPOs", day))
                })?;
                for (i, value) in rows.iter().enumerate() {
                    let row = Row::new(value, format!("{}[{}]", day, i))?;
                    let event_date = match row.optional_date("date")? {
                        Some(date) => date,
                        None => listed_on,
                    };
                    events.push(decode_ipo(&row, event_date)?);
                }
            }
        }
        IpoShape::List(rows) => {
            for (i, value) in rows.iter().enumerate() {
                let row = Row::new(value, format!("[{}]", i))?;
                let event_date = row.required_date("date")?;
                events.push(decode_ipo(&row, event_date)?);
            }
        }
        IpoShape::Unrecognized => {
            return Err(MarketDataError::data_shape(
                "IPO calendar body is neither a list nor keyed by date",
            ))
        }
    }

    events.sort_by(|a, b| (a.event_date, &a.symbol).cmp(&(b.event_date, &b.symbol)));
    Ok(events)
}

fn decode_ipo(row: &Row<'_>, event_date: chrono::NaiveDate) -> Result<IpoEvent, MarketDataError> {
    Ok(IpoEvent {
        symbol: row.required_str("symbol")?.to_string(),
        name: row.optional_string("name"),
        event_date,
        exchange: row.optional_string("exchange"),
        price_range_low: row.optional_decimal("price_range_low")?,
        price_range_high: row.optional_decimal("price_range_high")?,
        offer_price: row.optional_decimal("offer_price")?,
        shares: row.optional_decimal("shares")?,
        currency: row.optional_string("currency"),
    })
}
