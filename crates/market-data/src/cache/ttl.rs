//! Expiry policy per payload type.

use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::config::duration_secs;
use crate::models::QuoteQuery;

/// How long each kind of result stays fresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    /// Upper bound for intraday series; below it the bar length is used.
    #[serde(with = "duration_secs")]
    pub intraday_ttl_cap: Duration,
    /// Daily, weekly and monthly series.
    #[serde(with = "duration_secs")]
    pub daily_series_ttl: Duration,
    /// Series whose range ended before today.
    #[serde(with = "duration_secs")]
    pub historical_ttl: Duration,
    /// Lower bound for calendar entries near midnight UTC.
    #[serde(with = "duration_secs")]
    pub calendar_ttl_floor: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            intraday_ttl_cap: Duration::from_secs(5 * 60),
            daily_series_ttl: Duration::from_secs(60 * 60),
            historical_ttl: Duration::from_secs(24 * 60 * 60),
            calendar_ttl_floor: Duration::from_secs(60),
        }
    }
}

impl TtlPolicy {
    /// TTL for a time series, given the current wall-clock time.
    pub fn ttl_for_series(&self, query: &QuoteQuery, utc_now: DateTime<Utc>) -> Duration {
        let today = utc_now.date_naive();
        if query.end_date().is_some_and(|end| end < today) {
            return self.historical_ttl;
        }

        let interval = query.interval();
        if interval.is_intraday() {
            interval.duration().min(self.intraday_ttl_cap)
        } else {
            self.daily_series_ttl
        }
    }

    /// TTL for a calendar: until the end of the current UTC day.
    pub fn ttl_for_calendar(&self, utc_now: DateTime<Utc>) -> Duration {
        let until_midnight = utc_now
            .date_naive()
            .checked_add_days(Days::new(1))
            .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc() - utc_now)
            .and_then(|left| left.to_std().ok())
            .unwrap_or(Duration::ZERO);

        until_midnight.max(self.calendar_ttl_floor)
    }
}
