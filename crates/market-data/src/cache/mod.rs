//! Two-band (fresh/stale) result cache.
//!
//! Entries are stamped on write and never swept. Freshness is derived at
//! read time from the entry age:
//!
//! - **Fresh**: `age <= fresh_ttl`, served without touching the network.
//! - **Stale**: `fresh_ttl < age <= stale_ttl`, served only on the explicit
//!   stale path after every upstream has failed.
//! - Older entries are inert: kept, never served, overwritten on the next
//!   successful write.
//!
//! The cache is in-memory and rebuilds on demand after a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::clock::Clock;
use crate::config::CacheConfig;

/// Cache key for a previous-close lookup: normalized symbol plus offset.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn previous_close(symbol: &str, days_ago: u32) -> Self {
        Self(format!("price:{}:d:{}", symbol, days_ago))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a cache read.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<V> {
    Fresh(V),
    Stale(V),
    Absent,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Thread-safe tiered cache.
pub struct TieredCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TieredCache<V> {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fresh_ttl: to_chrono(config.fresh_ttl),
            stale_ttl: to_chrono(config.stale_ttl),
            clock,
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Price cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Classify the entry for `key` by age.
    pub fn lookup(&self, key: &CacheKey) -> Lookup<V> {
        let entries = self.lock_entries();
        let Some(entry) = entries.get(key) else {
            return Lookup::Absent;
        };

        let age = self.clock.now() - entry.stored_at;
        if age <= self.fresh_ttl {
            Lookup::Fresh(entry.value.clone())
        } else if age <= self.stale_ttl {
            Lookup::Stale(entry.value.clone())
        } else {
            debug!("Cache entry '{}' is past the stale window", key);
            Lookup::Absent
        }
    }

    /// Value for `key` if it is inside the fresh window.
    pub fn get_fresh(&self, key: &CacheKey) -> Option<V> {
        match self.lookup(key) {
            Lookup::Fresh(value) => Some(value),
            _ => None,
        }
    }

    /// Value for `key` if it is inside the stale window (fresh entries included).
    pub fn get_stale(&self, key: &CacheKey) -> Option<V> {
        match self.lookup(key) {
            Lookup::Fresh(value) | Lookup::Stale(value) => Some(value),
            Lookup::Absent => None,
        }
    }

    /// Store `value` under `key`, fully replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: V) {
        let stored_at = self.clock.now();
        debug!("Cache write '{}' at {}", key, stored_at);
        self.lock_entries()
            .insert(key, CacheEntry { value, stored_at });
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
