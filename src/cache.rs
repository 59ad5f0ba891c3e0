//! In-memory fingerprint cache: deterministic request key → canonical
//! response, with per-entry expiry.
//!
//! This is a correctness/staleness cache, not a memory-bounded LRU; the key
//! space is one entry per distinct query. Expired entries read as absent and
//! are evicted lazily on that read; there is no background sweep. The cache
//! alone does not guarantee at-most-one-fetch-per-key: two concurrent misses
//! on the same cold key may both fetch, and the last write wins, which is
//! safe because results for one key are deterministic.

use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key→entry map with externally supplied TTL per write.
pub struct FingerprintCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> FingerprintCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live value for `key`, evicting it first if expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!("cache hit for {key}");
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("cache entry for {key} expired, evicting");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value` under `key`, replacing any previous entry whole.
    pub async fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }
}

impl<V: Clone> Default for FingerprintCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
