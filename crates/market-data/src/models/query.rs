use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Largest `outputsize` the provider serves in a single response.
pub const MAX_OUTPUT_SIZE: u32 = 5000;

/// Bar granularity supported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "45min")]
    FortyFiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "1week")]
    OneWeek,
    #[serde(rename = "1month")]
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 11] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::FortyFiveMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Provider wire name (`5min`, `1day`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1min",
            Interval::FiveMinutes => "5min",
            Interval::FifteenMinutes => "15min",
            Interval::ThirtyMinutes => "30min",
            Interval::FortyFiveMinutes => "45min",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1day",
            Interval::OneWeek => "1week",
            Interval::OneMonth => "1month",
        }
    }

    /// Nominal length of one bar. Months are counted as 30 days.
    pub fn duration(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;
        Duration::from_secs(match self {
            Interval::OneMinute => MINUTE,
            Interval::FiveMinutes => 5 * MINUTE,
            Interval::FifteenMinutes => 15 * MINUTE,
            Interval::ThirtyMinutes => 30 * MINUTE,
            Interval::FortyFiveMinutes => 45 * MINUTE,
            Interval::OneHour => HOUR,
            Interval::TwoHours => 2 * HOUR,
            Interval::FourHours => 4 * HOUR,
            Interval::OneDay => DAY,
            Interval::OneWeek => 7 * DAY,
            Interval::OneMonth => 30 * DAY,
        })
    }

    /// True for granularities below one trading day.
    pub fn is_intraday(&self) -> bool {
        self.duration() < Duration::from_secs(24 * 60 * 60)
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Interval::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == wanted)
            .ok_or_else(|| MarketDataError::InvalidQuery(format!("unsupported interval: {s}")))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated time-series request.
///
/// Fields are private so that every instance went through [`QuoteQuery::new`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QuoteQuery {
    symbol: String,
    interval: Interval,
    output_size: u32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl QuoteQuery {
    /// Builds a query, normalising the symbol to upper case.
    ///
    /// `output_size` outside `1..=MAX_OUTPUT_SIZE` is rejected rather than
    /// clamped, and so is an inverted date range.
    pub fn new(
        symbol: &str,
        interval: Interval,
        output_size: u32,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, MarketDataError> {
        let symbol = normalize_symbol(symbol)?;

        if output_size == 0 || output_size > MAX_OUTPUT_SIZE {
            return Err(MarketDataError::InvalidQuery(format!(
                "outputsize must be between 1 and {MAX_OUTPUT_SIZE}, got {output_size}"
            )));
        }

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(MarketDataError::InvalidQuery(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }

        Ok(Self {
            symbol,
            interval,
            output_size,
            start_date,
            end_date,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn output_size(&self) -> u32 {
        self.output_size
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature::Series(self.clone())
    }
}

/// Kind of corporate calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    Dividend,
    Ipo,
}

impl CalendarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::Dividend => "dividend",
            CalendarKind::Ipo => "ipo",
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar request for a single day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CalendarQuery {
    pub kind: CalendarKind,
    pub date: NaiveDate,
}

impl CalendarQuery {
    pub fn new(kind: CalendarKind, date: NaiveDate) -> Self {
        Self { kind, date }
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature::Calendar(*self)
    }
}

/// Identity of a request for caching, rate accounting and coalescing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QuerySignature {
    Series(QuoteQuery),
    Calendar(CalendarQuery),
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn date_or_dash(date: Option<NaiveDate>) -> String {
            date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        }

        match self {
            QuerySignature::Series(q) => write!(
                f,
                "series:{}:{}:{}:{}:{}",
                q.symbol,
                q.interval,
                q.output_size,
                date_or_dash(q.start_date),
                date_or_dash(q.end_date)
            ),
            QuerySignature::Calendar(q) => write!(f, "calendar:{}:{}", q.kind, q.date),
        }
    }
}

fn normalize_symbol(raw: &str) -> Result<String, MarketDataError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MarketDataError::InvalidQuery("symbol is empty".to_string()));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '-' | ':' | '^' | '_');
    if let Some(bad) = trimmed.chars().find(|c| !allowed(*c)) {
        return Err(MarketDataError::InvalidQuery(format!(
            "symbol contains unsupported character {bad:?}"
        )));
    }

    Ok(trimmed.to_ascii_uppercase())
}
