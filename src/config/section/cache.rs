//! `[cache]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! enable = true                 # persist encoder output between builds
//! dir = ".imgshrink/cache"      # relative to the config file, `~` expanded
//! conversions = false           # also cache conversion outputs
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist encoder output on disk.
    pub enable: bool,

    /// Cache directory.
    pub dir: PathBuf,

    /// Memoize conversions too (compression is always memoized).
    pub conversions: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable: true,
            dir: PathBuf::from(".imgshrink/cache"),
            conversions: false,
        }
    }
}

impl CacheConfig {
    /// Cache directory with `~` expanded, joined to `root` when relative.
    pub fn resolved_dir(&self, root: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&self.dir.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_relative() {
            root.join(path)
        } else {
            path
        }
    }
}
