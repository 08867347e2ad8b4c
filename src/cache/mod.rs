//! Process-local TTL cache for remote query results
//!
//! Entries leave the map only through expiry or explicit invalidation.
//! Population is bounded by distinct (user, query, params) tuples, so no
//! size-based eviction policy is needed. The cache is constructed at the
//! composition root and passed into the executor rather than reached
//! through a global.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// Keyed TTL cache of recent query results.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a value under `key`, overwriting any existing entry.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Fetch a live value. Returns `None` if the key is missing or expired;
    /// an expired entry is removed as a side effect of the read.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the entry lock in case a writer refreshed it
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        None
    }

    /// Drop an entry regardless of freshness. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every expired entry. Safe to call at any cadence; calling it
    /// twice in a row is a no-op the second time.
    pub fn clear_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "cleared expired cache entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a periodic expiry sweep. The handle can be aborted on
    /// shutdown; the sweep holds no locks across await points.
    pub fn start_sweep_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.clear_expired();
            }
        })
    }
}
