//! Registry of fetches currently running, keyed by query signature.
//!
//! The first caller for a signature becomes the leader and receives a
//! [`Ticket`]; later callers subscribe to the same result. The ticket removes
//! the registry entry when dropped, so a fetch task that dies without
//! completing releases its followers instead of stranding them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use tokio::sync::watch;

use super::CachedPayload;
use crate::errors::MarketDataError;
use crate::models::QuerySignature;

pub(crate) type FetchResult = Result<CachedPayload, MarketDataError>;

type Outcome = watch::Receiver<Option<FetchResult>>;

pub(crate) enum Joined {
    /// Found in the cache; nothing to wait for.
    Ready(CachedPayload),
    /// Another caller is fetching; wait on the receiver.
    Follow(Outcome),
    /// No fetch is running; the caller must start one and complete the ticket.
    Lead(Ticket, Outcome),
}

#[derive(Default)]
pub(crate) struct InFlight {
    pending: Mutex<HashMap<QuerySignature, Outcome>>,
}

impl InFlight {
    fn lock_pending(&self) -> MutexGuard<'_, HashMap<QuerySignature, Outcome>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            warn!("In-flight registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Join the fetch for `signature`, consulting `cached` under the registry
    /// lock so a fetch that just finished is never started again.
    pub(crate) fn join<F>(self: &Arc<Self>, signature: &QuerySignature, cached: F) -> Joined
    where
        F: FnOnce() -> Option<CachedPayload>,
    {
        let mut pending = self.lock_pending();

        if let Some(outcome) = pending.get(signature) {
            return Joined::Follow(outcome.clone());
        }
        if let Some(hit) = cached() {
            return Joined::Ready(hit);
        }

        let (tx, rx) = watch::channel(None);
        pending.insert(signature.clone(), rx.clone());
        let ticket = Ticket {
            registry: Arc::clone(self),
            signature: signature.clone(),
            tx,
        };
        Joined::Lead(ticket, rx)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_pending().len()
    }
}

/// Leader's handle on a running fetch.
pub(crate) struct Ticket {
    registry: Arc<InFlight>,
    signature: QuerySignature,
    tx: watch::Sender<Option<FetchResult>>,
}

impl Ticket {
    /// Publish the result to every follower.
    pub(crate) fn complete(self, result: FetchResult) {
        self.tx.send_replace(Some(result));
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.registry.lock_pending().remove(&self.signature);
    }
}

/// Wait for the leader's result.
pub(crate) async fn wait(mut outcome: Outcome) -> FetchResult {
    match outcome.wait_for(Option::is_some).await {
        Ok(published) => published
            .clone()
            .unwrap_or_else(|| Err(MarketDataError::network("in-flight fetch produced no result"))),
        Err(_) => Err(MarketDataError::network(
            "in-flight fetch ended without a result",
        )),
    }
}
