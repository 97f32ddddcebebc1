//! Persistent cache store.
//!
//! Layout: `<dir>/<codec>-<options fingerprint>/<blake3 hex>`. Entries are
//! written once through a temp file and never modified. A missing or
//! unreadable entry is a miss.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::write_atomic;
use crate::cache::{CacheKey, CacheStore};

#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let namespace: String = key
            .namespace
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        self.dir.join(namespace).join(key.hash.to_hex())
    }

    /// Remove every entry.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl CacheStore for DiskStore {
    fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        fs::read(self.entry_path(key)).ok().map(Arc::from)
    }

    fn put(&self, key: &CacheKey, value: Arc<[u8]>) {
        let path = self.entry_path(key);
        if path.exists() {
            return;
        }
        if let Err(e) = write_atomic(&path, &value) {
            crate::debug!("cache"; "failed to persist {}: {}", path.display(), e);
        }
    }
}
