//! Field-level decoding shared by the series and calendar normalizers.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::errors::MarketDataError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a decimal from a JSON string or number.
///
/// Returns `None` for anything that is not a finite decimal, including
/// `"NaN"`, `"inf"` and empty strings.
pub(crate) fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Parse `YYYY-MM-DD HH:MM:SS`, or a bare date as midnight.
pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .ok()
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// One JSON object from a provider payload, with its position for error messages.
pub(crate) struct Row<'a> {
    fields: &'a Map<String, Value>,
    context: String,
}

impl<'a> Row<'a> {
    pub(crate) fn new(value: &'a Value, context: String) -> Result<Self, MarketDataError> {
        match value.as_object() {
            Some(fields) => Ok(Self { fields, context }),
            None => Err(MarketDataError::data_shape(format!(
                "{} is not an object",
                context
            ))),
        }
    }

    /// Field value, treating `null` as absent.
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn missing(&self, name: &str) -> MarketDataError {
        MarketDataError::data_shape(format!("{}.{} is missing", self.context, name))
    }

    fn invalid(&self, name: &str, value: &Value) -> MarketDataError {
        MarketDataError::data_shape(format!("{}.{} has invalid value {}", self.context, name, value))
    }

    pub(crate) fn required_decimal(&self, name: &str) -> Result<Decimal, MarketDataError> {
        let value = self.get(name).ok_or_else(|| self.missing(name))?;
        parse_decimal(value).ok_or_else(|| self.invalid(name, value))
    }

    /// Absent, `null` or `""` read as `None`; any other non-decimal is an error.
    pub(crate) fn optional_decimal(&self, name: &str) -> Result<Option<Decimal>, MarketDataError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(value) => parse_decimal(value).map(Some).ok_or_else(|| self.invalid(name, value)),
        }
    }

    pub(crate) fn required_str(&self, name: &str) -> Result<&'a str, MarketDataError> {
        match self.get(name) {
            None => Err(self.missing(name)),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
            Some(value) => Err(self.invalid(name, value)),
        }
    }

    pub(crate) fn optional_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub(crate) fn required_date(&self, name: &str) -> Result<NaiveDate, MarketDataError> {
        let value = self.get(name).ok_or_else(|| self.missing(name))?;
        value
            .as_str()
            .and_then(parse_date)
            .ok_or_else(|| self.invalid(name, value))
    }

    pub(crate) fn optional_date(&self, name: &str) -> Result<Option<NaiveDate>, MarketDataError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(value) => value
                .as_str()
                .and_then(parse_date)
                .map(Some)
                .ok_or_else(|| self.invalid(name, value)),
        }
    }

    pub(crate) fn required_datetime(&self, name: &str) -> Result<NaiveDateTime, MarketDataError> {
        let value = self.get(name).ok_or_else(|| self.missing(name))?;
        value
            .as_str()
            .and_then(parse_datetime)
            .ok_or_else(|| self.invalid(name, value))
    }
}
