//! Content-addressed memoization of encoder output.
//!
//! Entries are keyed by `(namespace, blake3(input))`. The namespace names the
//! codec and a fingerprint of its merged options, so two assets with the same
//! bytes share one entry regardless of their names, and an option change
//! never reuses stale output.
//!
//! [`TransformCache::get_or_compute`] runs the computation at most once per
//! key for successful results: concurrent callers for the same key wait on a
//! per-key lock and then read the stored entry. Failures are never stored.

mod hash;
mod store;

pub use hash::ContentHash;
pub use store::{CacheStore, MemoryStore};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::codec::{CodecId, CodecOptions};

/// Cache entry address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Arc<str>,
    pub hash: ContentHash,
}

impl CacheKey {
    pub fn new(namespace: impl Into<Arc<str>>, hash: ContentHash) -> Self {
        Self {
            namespace: namespace.into(),
            hash,
        }
    }

    /// Namespace for a codec invoked with `options` (already merged).
    pub fn namespace_for(codec: CodecId, options: &CodecOptions) -> String {
        format!("{codec}:{}", options.fingerprint())
    }
}

/// Counters for one cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub stores: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    stores: AtomicUsize,
}

/// Store plus in-flight de-duplication.
pub struct TransformCache {
    store: Box<dyn CacheStore>,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
    counters: Counters,
}

impl TransformCache {
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            inflight: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Return the entry for `key`, computing and storing it on a miss.
    pub fn get_or_compute<E>(
        &self,
        key: &CacheKey,
        compute: impl FnOnce() -> Result<Vec<u8>, E>,
    ) -> Result<Arc<[u8]>, E> {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }

        let slot = self.inflight.entry(key.clone()).or_default().clone();
        let guard = slot.lock();

        // Another caller may have finished while we waited
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let result = compute().map(|bytes| {
            let bytes: Arc<[u8]> = bytes.into();
            self.store.put(key, Arc::clone(&bytes));
            self.counters.stores.fetch_add(1, Ordering::Relaxed);
            bytes
        });

        drop(guard);
        self.inflight.remove(key);
        result
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        let hit = self.store.get(key)?;
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(hit)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
