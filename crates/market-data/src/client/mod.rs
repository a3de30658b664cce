//! Market data client: cache, rate budget and provider behind one handle.
//!
//! Request flow:
//!
//! 1. Validate the query and compute its signature.
//! 2. Return the cached result if one is live.
//! 3. Otherwise join the in-flight fetch for the signature, or start one.
//!    The fetch takes a rate slot, calls the gateway (retrying network
//!    failures), normalizes and caches the result.
//! 4. The whole path is bounded by `request_timeout`.
//!
//! The fetch runs as its own task. A caller that times out or is dropped
//! stops waiting, but the fetch still completes and fills the cache for the
//! next caller.

mod fetch;
mod inflight;
mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

use crate::cache::{CacheStats, CacheStore};
use crate::clock::{Clock, TokioClock};
use crate::config::MarketDataConfig;
use crate::errors::MarketDataError;
use crate::models::{
    CalendarKind, CalendarQuery, DividendEvent, Interval, IpoEvent, QuerySignature, QuoteQuery,
    TimeSeriesBar,
};
use crate::provider::{ProviderGateway, TwelveDataGateway};
use crate::rate_limiter::RateLimiter;

use inflight::{InFlight, Joined};

/// A normalized result as held in the cache.
///
/// Slices are shared, so a cache hit hands out a pointer copy.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedPayload {
    Series(Arc<[TimeSeriesBar]>),
    Dividends(Arc<[DividendEvent]>),
    Ipos(Arc<[IpoEvent]>),
}

impl CachedPayload {
    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            CachedPayload::Series(bars) => bars.len(),
            CachedPayload::Dividends(events) => events.len(),
            CachedPayload::Ipos(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            CachedPayload::Series(_) => "series",
            CachedPayload::Dividends(_) => "dividends",
            CachedPayload::Ipos(_) => "ipos",
        }
    }
}

/// Snapshot of the provider rate budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateBudget {
    pub calls_in_window: usize,
    pub quota: usize,
    pub window_secs: u64,
}

struct ClientInner {
    config: MarketDataConfig,
    gateway: Arc<dyn ProviderGateway>,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    cache: CacheStore<QuerySignature, CachedPayload>,
    inflight: Arc<InFlight>,
    /// Serializes callers that have to sleep for a rate slot.
    wait_gate: tokio::sync::Mutex<()>,
}

/// Shared entry point for market data.
///
/// Cloning is cheap; every clone uses the same cache, rate budget and
/// in-flight registry. Build one at startup and hand clones to whoever needs
/// it.
#[derive(Clone)]
pub struct MarketDataClient {
    inner: Arc<ClientInner>,
}

impl MarketDataClient {
    /// Create a client over an explicit gateway and clock.
    pub fn new(
        config: MarketDataConfig,
        gateway: Arc<dyn ProviderGateway>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MarketDataError> {
        config.validate()?;

        info!(
            "Market data client: {} calls per {:?}, cache capacity {}, provider {}",
            config.rate_limit.quota,
            config.rate_limit.window,
            config.cache.capacity,
            gateway.id()
        );

        let inner = ClientInner {
            limiter: RateLimiter::new(&config.rate_limit, Arc::clone(&clock)),
            cache: CacheStore::new(config.cache.capacity, Arc::clone(&clock)),
            inflight: Arc::new(InFlight::default()),
            wait_gate: tokio::sync::Mutex::new(()),
            config,
            gateway,
            clock,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create a client talking to Twelve Data on the tokio clock.
    pub fn from_config(config: MarketDataConfig) -> Result<Self, MarketDataError> {
        let gateway = Arc::new(TwelveDataGateway::new(&config.provider));
        Self::new(config, gateway, Arc::new(TokioClock))
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.inner.config
    }

    /// OHLCV bars for `symbol`, oldest first.
    pub async fn get_time_series(
        &self,
        symbol: &str,
        interval: Interval,
        output_size: u32,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Arc<[TimeSeriesBar]>, MarketDataError> {
        let query = QuoteQuery::new(symbol, interval, output_size, start_date, end_date)?;
        self.get_series(&query).await
    }

    /// OHLCV bars for an already validated query.
    pub async fn get_series(&self, query: &QuoteQuery) -> Result<Arc<[TimeSeriesBar]>, MarketDataError> {
        match self.load(query.signature()).await? {
            CachedPayload::Series(bars) => Ok(bars),
            other => Err(unexpected_payload("series", &other)),
        }
    }

    /// Dividend events with an ex-date of `date`.
    pub async fn get_dividend_calendar(
        &self,
        date: NaiveDate,
    ) -> Result<Arc<[DividendEvent]>, MarketDataError> {
        let query = CalendarQuery::new(CalendarKind::Dividend, date);
        match self.load(query.signature()).await? {
            CachedPayload::Dividends(events) => Ok(events),
            other => Err(unexpected_payload("dividends", &other)),
        }
    }

    /// IPOs listing on `date`.
    pub async fn get_ipo_calendar(&self, date: NaiveDate) -> Result<Arc<[IpoEvent]>, MarketDataError> {
        let query = CalendarQuery::new(CalendarKind::Ipo, date);
        match self.load(query.signature()).await? {
            CachedPayload::Ipos(events) => Ok(events),
            other => Err(unexpected_payload("ipos", &other)),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn rate_budget(&self) -> RateBudget {
        let limiter = &self.inner.limiter;
        RateBudget {
            calls_in_window: limiter.in_window(),
            quota: limiter.quota(),
            window_secs: limiter.window().as_secs(),
        }
    }

    /// Time left before the cached result for `signature` expires.
    pub fn cache_ttl(&self, signature: &QuerySignature) -> Option<Duration> {
        self.inner.cache.ttl_remaining(signature)
    }

    /// Drop the cached result for `signature`. Returns true if one existed.
    pub fn invalidate(&self, signature: &QuerySignature) -> bool {
        self.inner.cache.invalidate(signature)
    }

    /// Purge expired cache entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.inner.cache.evict_expired()
    }

    /// Number of fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Cache lookup, then coalesced fetch, under the request deadline.
    async fn load(&self, signature: QuerySignature) -> Result<CachedPayload, MarketDataError> {
        let deadline = self.inner.config.request_timeout;
        match tokio::time::timeout(deadline, self.load_uncapped(signature)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout { elapsed: deadline }),
        }
    }

    async fn load_uncapped(&self, signature: QuerySignature) -> Result<CachedPayload, MarketDataError> {
        let joined = self
            .inner
            .inflight
            .join(&signature, || self.inner.cache.get(&signature));

        let outcome = match joined {
            Joined::Ready(hit) => {
                debug!("Cache hit for {}", signature);
                return Ok(hit);
            }
            Joined::Follow(outcome) => {
                debug!("Joining in-flight fetch for {}", signature);
                outcome
            }
            Joined::Lead(ticket, outcome) => {
                debug!("Cache miss for {}, fetching", signature);
                let client = self.clone();
                tokio::spawn(async move {
                    let result = client.inner.fetch(&signature).await;
                    ticket.complete(result);
                });
                outcome
            }
        };

        inflight::wait(outcome).await
    }
}

fn unexpected_payload(expected: &str, got: &CachedPayload) -> MarketDataError {
    MarketDataError::data_shape(format!(
        "expected {} payload, found {}",
        expected,
        got.kind()
    ))
}
