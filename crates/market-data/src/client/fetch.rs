//! The miss path of a request, as an explicit state machine.
//!
//! ```text
//! AcquireSlot -> Fetch -> Normalize -> Store -> done
//!      ^           |
//!      |           v  (network error, retries left)
//!      +------- Backoff
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use super::{CachedPayload, ClientInner};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{CalendarKind, QuerySignature};
use crate::normalizer::{normalize_dividends, normalize_ipos, normalize_series};
use crate::provider::RawPayload;
use crate::rate_limiter::Acquire;

#[derive(Debug)]
enum FetchState {
    AcquireSlot { attempt: u32 },
    Fetch { attempt: u32 },
    Backoff { attempt: u32, error: MarketDataError },
    Normalize(RawPayload),
    Store(CachedPayload),
}

impl ClientInner {
    /// Run the miss path for `signature` to completion.
    pub(super) async fn fetch(&self, signature: &QuerySignature) -> Result<CachedPayload, MarketDataError> {
        let mut state = FetchState::AcquireSlot { attempt: 0 };

        loop {
            state = match state {
                FetchState::AcquireSlot { attempt } => {
                    self.acquire_slot().await?;
                    FetchState::Fetch { attempt }
                }
                FetchState::Fetch { attempt } => match self.call_gateway(signature).await {
                    Ok(raw) => FetchState::Normalize(raw),
                    Err(error)
                        if error.retry_class() == RetryClass::WithBackoff
                            && self.config.retry.allows_retry(attempt) =>
                    {
                        FetchState::Backoff { attempt, error }
                    }
                    Err(error) => {
                        warn!("Fetch for {} failed: {}", signature, error);
                        return Err(error);
                    }
                },
                FetchState::Backoff { attempt, error } => {
                    let delay = self.config.retry.delay(attempt);
                    warn!(
                        "Fetch for {} failed (attempt {}): {}. Retrying in {:?}",
                        signature,
                        attempt + 1,
                        error,
                        delay
                    );
                    self.clock.sleep(delay).await;
                    FetchState::AcquireSlot { attempt: attempt + 1 }
                }
                FetchState::Normalize(raw) => FetchState::Store(normalize(signature, &raw)?),
                FetchState::Store(payload) => {
                    let now = self.clock.utc_now();
                    let ttl = match signature {
                        QuerySignature::Series(query) => self.config.cache.ttl.ttl_for_series(query, now),
                        QuerySignature::Calendar(_) => self.config.cache.ttl.ttl_for_calendar(now),
                    };
                    info!("Fetched {} ({} records), caching for {:?}", signature, payload.len(), ttl);
                    self.cache.put(signature.clone(), payload.clone(), ttl);
                    return Ok(payload);
                }
            };
        }
    }

    /// Take a rate slot, waiting at most `max_rate_limit_wait` in total.
    ///
    /// Waiters queue on the wait gate so that one freed slot is not raced for
    /// by every sleeper at once. Time spent queued on the gate counts against
    /// the same budget as the sleep for the slot itself.
    async fn acquire_slot(&self) -> Result<(), MarketDataError> {
        let deadline = self.clock.now() + self.config.max_rate_limit_wait;
        let remaining = || deadline.saturating_duration_since(self.clock.now());

        match self.limiter.try_acquire() {
            Acquire::Granted => return Ok(()),
            Acquire::MustWait(wait) if wait > remaining() => {
                return Err(MarketDataError::RateLimitExceeded { wait })
            }
            Acquire::MustWait(_) => {}
        }

        let _gate = tokio::select! {
            biased;
            gate = self.wait_gate.lock() => gate,
            _ = self.clock.sleep(remaining()) => {
                debug!("Rate wait budget spent queueing for a slot");
                return match self.limiter.try_acquire() {
                    Acquire::Granted => Ok(()),
                    Acquire::MustWait(wait) => Err(MarketDataError::RateLimitExceeded { wait }),
                };
            }
        };

        match self.limiter.try_acquire() {
            Acquire::Granted => Ok(()),
            Acquire::MustWait(wait) if wait > remaining() => Err(MarketDataError::RateLimitExceeded { wait }),
            Acquire::MustWait(wait) => {
                debug!("Rate budget exhausted, waiting {:?} for a slot", wait);
                self.clock.sleep(wait).await;
                match self.limiter.try_acquire() {
                    Acquire::Granted => Ok(()),
                    Acquire::MustWait(wait) => Err(MarketDataError::RateLimitExceeded { wait }),
                }
            }
        }
    }

    async fn call_gateway(&self, signature: &QuerySignature) -> Result<RawPayload, MarketDataError> {
        debug!("Calling {} for {}", self.gateway.id(), signature);
        match signature {
            QuerySignature::Series(query) => self.gateway.fetch_series(query).await,
            QuerySignature::Calendar(query) => self.gateway.fetch_calendar(query).await,
        }
    }
}

fn normalize(signature: &QuerySignature, raw: &RawPayload) -> Result<CachedPayload, MarketDataError> {
    let payload = match signature {
        QuerySignature::Series(query) => {
            let mut bars = normalize_series(raw)?;
            let limit = query.output_size() as usize;
            if bars.len() > limit {
                warn!(
                    "{} returned {} bars for outputsize {}, keeping the newest {}",
                    signature,
                    bars.len(),
                    limit,
                    limit
                );
                let excess = bars.len() - limit;
                bars.drain(..excess);
            }
            CachedPayload::Series(Arc::from(bars))
        }
        QuerySignature::Calendar(query) => match query.kind {
            CalendarKind::Dividend => CachedPayload::Dividends(Arc::from(normalize_dividends(raw)?)),
            CalendarKind::Ipo => CachedPayload::Ipos(Arc::from(normalize_ipos(raw)?)),
        },
    };
    Ok(payload)
}
