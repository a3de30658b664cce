//! Sliding-window rate limiter for the market data provider.
//!
//! Keeps the timestamps of the calls granted during the last `window` and
//! refuses a new call while `quota` of them are still inside it. Purging,
//! checking and recording happen under one lock, so concurrent callers can
//! never push the window above its quota.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock::Clock;

/// Default quota: 8 requests per minute (provider free tier).
const DEFAULT_QUOTA: u32 = 8;

/// Default rolling window length.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of [`RateLimiter::try_acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// A slot was granted and recorded.
    Granted,
    /// The window is full; the oldest call leaves it after this duration.
    MustWait(Duration),
}

/// Rate limiter configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum calls per window.
    pub quota: u32,
    /// Rolling window length.
    #[serde(with = "crate::config::duration_secs")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quota: DEFAULT_QUOTA,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug)]
struct SlidingWindow {
    calls: VecDeque<Instant>,
    quota: usize,
    window: Duration,
}

impl SlidingWindow {
    fn new(config: &RateLimitConfig) -> Self {
        let quota = config.quota.max(1) as usize;
        Self {
            calls: VecDeque::with_capacity(quota),
            quota,
            window: config.window,
        }
    }

    /// Drop calls that are at least `window` old.
    fn purge(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_acquire(&mut self, now: Instant) -> Acquire {
        self.purge(now);

        if self.calls.len() < self.quota {
            self.calls.push_back(now);
            return Acquire::Granted;
        }

        match self.calls.front() {
            Some(&oldest) => Acquire::MustWait((oldest + self.window).saturating_duration_since(now)),
            None => Acquire::MustWait(self.window),
        }
    }
}

/// Process-wide rate budget for the provider.
pub struct RateLimiter {
    state: Mutex<SlidingWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(SlidingWindow::new(config)),
            clock,
        }
    }

    /// Lock the window, recovering from poison if necessary.
    ///
    /// The window holds plain timestamps, so a panic elsewhere cannot leave
    /// it half-updated.
    fn lock_state(&self) -> MutexGuard<'_, SlidingWindow> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Try to take a slot without waiting.
    pub fn try_acquire(&self) -> Acquire {
        let now = self.clock.now();
        let outcome = self.lock_state().try_acquire(now);
        match outcome {
            Acquire::Granted => debug!("Rate limiter: slot granted"),
            Acquire::MustWait(wait) => debug!("Rate limiter: window full, next slot in {:?}", wait),
        }
        outcome
    }

    /// Number of calls currently counted against the window.
    pub fn in_window(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.purge(now);
        state.calls.len()
    }

    pub fn quota(&self) -> usize {
        self.lock_state().quota
    }

    pub fn window(&self) -> Duration {
        self.lock_state().window
    }

    /// Forget every recorded call.
    pub fn reset(&self) {
        self.lock_state().calls.clear();
    }
}
