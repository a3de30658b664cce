//! MarketDesk Market Data Crate
//!
//! This crate fetches time series and corporate calendars from a rate-limited
//! market data provider and hands them out in a canonical shape.
//!
//! # Overview
//!
//! The market data crate supports:
//! - OHLCV time series from 1-minute to monthly bars
//! - Dividend and IPO calendars
//! - A process-wide sliding-window rate budget
//! - A TTL cache with a capacity bound
//! - Coalescing of identical concurrent requests
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  Caller (axum)   |
//! +------------------+
//!          |
//!          v
//! +------------------+     hit     +------------------+
//! | MarketDataClient | ----------> |    CacheStore    |
//! +------------------+             +------------------+
//!          | miss
//!          v
//! +------------------+
//! |   RateLimiter    |  (sliding window, shared)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | ProviderGateway  |  (Twelve Data over HTTP)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    Normalizer    |  (tagged decode into bars and events)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataClient`] - Shared entry point; cheap to clone
//! - [`QuoteQuery`] / [`CalendarQuery`] - Validated requests
//! - [`QuerySignature`] - Cache, rate and coalescing identity
//! - [`TimeSeriesBar`] - One OHLCV bar
//! - [`DividendEvent`] / [`IpoEvent`] - Calendar records
//! - [`MarketDataError`] - Failure taxonomy

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalizer;
pub mod provider;
pub mod rate_limiter;

pub use models::{
    CalendarKind, CalendarQuery, DividendEvent, Interval, IpoEvent,
    QuerySignature, QuoteQuery, TimeSeriesBar, MAX_OUTPUT_SIZE,
};

pub use cache::{CacheStats, CacheStore, TtlPolicy};
pub use client::{CachedPayload, MarketDataClient, RateBudget, RetryPolicy};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{CacheConfig, MarketDataConfig, ProviderConfig, DEFAULT_BASE_URL};
pub use errors::{MarketDataError, RetryClass};
pub use provider::{ProviderGateway, RawPayload, TwelveDataGateway};
pub use rate_limiter::{Acquire, RateLimitConfig, RateLimiter};
