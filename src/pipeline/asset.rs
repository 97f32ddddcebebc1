//! Assets and the asset set the pipeline reads from and writes to.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::cache::ContentHash;
use crate::codec::Format;
use crate::matcher::is_reference;

/// Metadata bag attached to an asset.
///
/// `minimized` and `converted` mark assets a pass already finalized; the
/// pipeline never submits such an asset again.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub minimized: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_format: Option<Format>,
    /// Host-defined keys, carried over to converted assets.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetInfo {
    /// Already transformed by an earlier pass.
    pub const fn is_processed(&self) -> bool {
        self.minimized || self.converted
    }

    /// Info for an asset compressed in place.
    pub fn minimized(&self) -> Self {
        Self {
            minimized: true,
            ..self.clone()
        }
    }

    /// Info for the asset emitted by a conversion.
    pub fn converted(&self, from: Format, to: Format) -> Self {
        Self {
            converted: true,
            original_format: Some(from),
            converted_format: Some(to),
            ..self.clone()
        }
    }
}

/// A named binary artifact in the build output.
#[derive(Debug, Clone)]
pub struct Asset {
    name: String,
    content: Arc<[u8]>,
    info: AssetInfo,
    hash: OnceLock<ContentHash>,
}

impl Asset {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self::with_info(name, content, AssetInfo::default())
    }

    pub fn with_info(
        name: impl Into<String>,
        content: impl Into<Arc<[u8]>>,
        info: AssetInfo,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            info,
            hash: OnceLock::new(),
        }
    }

    /// Logical path, `/`-separated, possibly with a `?query` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Arc<[u8]> {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub const fn info(&self) -> &AssetInfo {
        &self.info
    }

    /// blake3 digest of the content, computed on first use.
    pub fn hash(&self) -> ContentHash {
        *self.hash.get_or_init(|| ContentHash::of(&self.content))
    }

    /// Format guessed from the name's extension.
    pub fn format(&self) -> Option<Format> {
        Format::guess(&self.name)
    }

    /// `?url` / `?inline` references are not emittable binaries.
    pub fn is_reference(&self) -> bool {
        is_reference(&self.name)
    }
}

/// Ordered name → asset map.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    assets: BTreeMap<String, Asset>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset, replacing any asset with the same name.
    pub fn emit(&mut self, asset: Asset) -> Option<Asset> {
        self.assets.insert(asset.name.clone(), asset)
    }

    /// Replace the content and info of an existing asset.
    ///
    /// Returns `false` if no asset has that name.
    pub fn update(&mut self, name: &str, content: Arc<[u8]>, info: AssetInfo) -> bool {
        match self.assets.get_mut(name) {
            Some(asset) => {
                *asset = Asset::with_info(name, content, info);
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, name: &str) -> Option<Asset> {
        self.assets.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<Asset> for AssetSet {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        let mut set = Self::new();
        for asset in iter {
            set.emit(asset);
        }
        set
    }
}
