//! Time source used by the rate limiter, the cache and the fetch loop.
//!
//! Everything that reads the time or waits goes through [`Clock`], so tests can
//! drive the client with [`ManualClock`] (or tokio's paused clock) instead of
//! real timers.

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time, used for windows and expiry.
    fn now(&self) -> Instant;

    /// Wall-clock time, used where expiry depends on the calendar day.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Hand-driven clock for tests.
///
/// Time only moves through [`advance`](Self::advance) or [`Clock::sleep`],
/// which advances the clock by the requested duration and returns at once.
pub struct ManualClock {
    origin: Instant,
    utc_origin: DateTime<Utc>,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(utc_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            utc_origin,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Duration> {
        self.elapsed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("utc_origin", &self.utc_origin)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.utc_origin + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
