//! In-memory TTL cache with a least-recently-used capacity bound.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::clock::Clock;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    expires_at: Instant,
    /// Recency stamp; key into `CacheInner::recency`.
    touched: u64,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counters exposed for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug)]
struct CacheInner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    /// Recency stamp -> key, oldest first.
    recency: BTreeMap<u64, K>,
    next_stamp: u64,
    capacity: usize,
    stats: CacheStats,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            recency: BTreeMap::new(),
            next_stamp: 0,
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.map.remove(key)?;
        self.recency.remove(&entry.touched);
        Some(entry)
    }

    fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let live = match self.map.get(key) {
            Some(entry) => entry.is_live(now),
            None => {
                self.stats.misses += 1;
                return None;
            }
        };

        if !live {
            self.remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        let stamp = self.stamp();
        let entry = self.map.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.touched, stamp);
        let value = entry.value.clone();
        self.recency.remove(&previous);
        self.recency.insert(stamp, key.clone());
        self.stats.hits += 1;
        Some(value)
    }

    fn put(&mut self, key: K, value: V, now: Instant, ttl: Duration) {
        self.remove(&key);

        if self.map.len() >= self.capacity {
            self.evict_expired(now);
        }
        while self.map.len() >= self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.map.remove(&oldest);
            self.stats.evictions += 1;
        }

        let touched = self.stamp();
        self.recency.insert(touched, key.clone());
        self.map.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                expires_at: now + ttl,
                touched,
            },
        );
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .map
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }

    fn ttl_remaining(&self, key: &K, now: Instant) -> Option<Duration> {
        self.map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }
}

/// Thread-safe TTL cache shared by all callers of the client.
///
/// Values should be cheap to clone (the client stores `Arc` snapshots).
/// Reads bump recency, so every operation takes the same mutex; it is held
/// only for the map update, never across an await.
pub struct CacheStore<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::new(capacity)),
            clock,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, CacheInner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Cache store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Get a cached value if it exists and hasn't expired.
    ///
    /// An expired entry counts as a miss and is removed on the spot.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.lock_inner().get(key, now)
    }

    /// Insert or replace a value.
    ///
    /// A zero `ttl` is a no-op: such an entry could never be read. When the
    /// store is full, expired entries go first, then the least recently used.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            debug!("Cache: ignoring put with zero TTL");
            return;
        }
        let now = self.clock.now();
        self.lock_inner().put(key, value, now, ttl);
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.lock_inner().evict_expired(now);
        if removed > 0 {
            debug!("Cache: evicted {} expired entries", removed);
        }
        removed
    }

    /// Remove one entry. Returns true if it was present.
    pub fn invalidate(&self, key: &K) -> bool {
        self.lock_inner().remove(key).is_some()
    }

    /// Time left before `key` expires, if it is live.
    pub fn ttl_remaining(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        self.lock_inner().ttl_remaining(key, now)
    }

    /// Age of a live entry.
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        let inner = self.lock_inner();
        inner
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| now - entry.stored_at)
    }

    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.map.clear();
        inner.recency.clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock_inner().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock_inner();
        CacheStats {
            entries: inner.map.len(),
            capacity: inner.capacity,
            ..inner.stats
        }
    }
}
