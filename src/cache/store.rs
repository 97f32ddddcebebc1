//! Cache backends.

use dashmap::DashMap;
use std::sync::Arc;

use super::CacheKey;

/// Storage for immutable cache entries.
///
/// Implementations must tolerate concurrent calls. `put` on an existing key
/// may be ignored: entries are content-addressed and never change.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>>;
    fn put(&self, key: &CacheKey, value: Arc<[u8]>);
}

/// Process-lifetime store (thread-safe).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        self.entries.get(key).map(|r| Arc::clone(&r))
    }

    fn put(&self, key: &CacheKey, value: Arc<[u8]>) {
        self.entries.entry(key.clone()).or_insert(value);
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, value: Arc<[u8]>) {
        (**self).put(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentHash;

    #[test]
    fn test_memory_store_never_overwrites() {
        let store = MemoryStore::new();
        let key = CacheKey::new("jpeg:abc", ContentHash::of(b"in"));
        store.put(&key, Arc::from(&b"first"[..]));
        store.put(&key, Arc::from(&b"second"[..]));
        assert_eq!(store.get(&key).as_deref(), Some(&b"first"[..]));
        assert_eq!(store.entries.len(), 1);
    }
}
