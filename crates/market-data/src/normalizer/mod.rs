//! Provider payload normalization.
//!
//! Each normalizer first classifies the body into one of the layouts the
//! provider is known to send and only then reads fields. A body that matches
//! no layout, or a row missing a required field, fails with
//! [`MarketDataError::DataShape`](crate::errors::MarketDataError::DataShape);
//! nothing partial is returned.

mod calendar;
mod decode;
mod series;

pub use calendar::{normalize_dividends, normalize_ipos};
pub use series::normalize_series;
