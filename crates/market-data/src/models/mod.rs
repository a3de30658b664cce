//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `query` - Validated requests (QuoteQuery, CalendarQuery) and their cache identity (QuerySignature)
//! - `bar` - Canonical OHLCV bar (TimeSeriesBar)
//! - `calendar` - Corporate calendar records (DividendEvent, IpoEvent)

mod bar;
mod calendar;
mod query;

pub use bar::TimeSeriesBar;
pub use calendar::{DividendEvent, IpoEvent};
pub use query::{
    CalendarKind, CalendarQuery, Interval, QuerySignature, QuoteQuery, MAX_OUTPUT_SIZE,
};
