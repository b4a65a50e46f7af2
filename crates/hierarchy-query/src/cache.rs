//! Plurality-proof caching.
//!
//! Proofs depend only on the immutable schema, so a cached proof never goes
//! stale. The cache is a memo: it never changes observable results.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use hierarchy_schema::PluralityProof;
use lru::LruCache;
use tracing::warn;

use crate::config::CacheConfig;

/// Hit and miss counters of a [`PathCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to consult the schema.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe LRU cache of plurality proofs keyed by (start, end) type names.
pub struct PathCache {
    inner: Mutex<LruCache<(String, String), PluralityProof>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PathCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A poisoned cache is bypassed: lookups miss and stores are dropped.
    fn lock(&self) -> Option<MutexGuard<'_, LruCache<(String, String), PluralityProof>>> {
        match self.inner.lock() {
            Ok(cache) => Some(cache),
            Err(_) => {
                warn!("path cache mutex poisoned; bypassing cache");
                None
            }
        }
    }

    /// Returns true if a panic while holding the lock disabled the cache.
    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }

    /// Gets a cached proof, promoting it to most-recently-used.
    pub fn get(&self, start: &str, end: &str) -> Option<PluralityProof> {
        let found = self
            .lock()
            .and_then(|mut cache| cache.get(&(start.to_string(), end.to_string())).cloned());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Stores a proof.
    pub fn set(&self, start: &str, end: &str, proof: PluralityProof) {
        if let Some(mut cache) = self.lock() {
            cache.put((start.to_string(), end.to_string()), proof);
        }
    }

    /// Number of cached proofs.
    pub fn len(&self) -> usize {
        self.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached proof. Counters are kept.
    pub fn clear(&self) {
        if let Some(mut cache) = self.lock() {
            cache.clear();
        }
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
