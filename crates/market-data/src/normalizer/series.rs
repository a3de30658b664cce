use serde_json::Value;

use super::decode::Row;
use crate::errors::MarketDataError;
use crate::models::TimeSeriesBar;
use crate::provider::RawPayload;

/// Recognised layouts of a time-series body.
#[derive(Debug)]
pub(crate) enum SeriesShape<'a> {
    /// `{"meta": {...}, "values": [...], "status": "ok"}`
    Values(&'a [Value]),
    Unrecognized,
}

impl<'a> SeriesShape<'a> {
    pub(crate) fn classify(body: &'a Value) -> Self {
        match body.get("values").and_then(Value::as_array) {
            Some(values) => SeriesShape::Values(values),
            None => SeriesShape::Unrecognized,
        }
    }
}

/// Convert a time-series body into bars sorted by ascending timestamp.
///
/// The provider lists bars newest first. `datetime` and `close` are required
/// on every row; `open`, `high`, `low` and `volume` may be absent (volume is
/// never sent for FX pairs). Two rows with the same timestamp fail the whole
/// payload.
pub fn normalize_series(payload: &RawPayload) -> Result<Vec<TimeSeriesBar>, MarketDataError> {
    let rows = match SeriesShape::classify(payload.body()) {
        SeriesShape::Values(rows) => rows,
        SeriesShape::Unrecognized => {
            return Err(MarketDataError::data_shape(
                "time series body has no `values` array",
            ))
        }
    };

    let mut bars = rows
        .iter()
        .enumerate()
        .map(|(i, value)| decode_bar(&Row::new(value, format!("values[{}]", i))?))
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by_key(|bar| bar.timestamp);

    if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(MarketDataError::data_shape(format!(
            "duplicate bar timestamp {}",
            pair[0].timestamp
        )));
    }

    Ok(bars)
}

fn decode_bar(row: &Row<'_>) -> Result<TimeSeriesBar, MarketDataError> {
    Ok(TimeSeriesBar {
        timestamp: row.required_datetime("datetime")?,
        open: row.optional_decimal("open")?,
        high: row.optional_decimal("high")?,
        low: row.optional_decimal("low")?,
        close: row.required_decimal("close")?,
        volume: row.optional_decimal("volume")?,
    })
}
