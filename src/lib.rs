//! Rule-driven image compression and conversion for build pipelines.
//!
//! A build tool hands the optimize stage an [`AssetSet`]. The [`Pipeline`]
//! matches every image against an ordered rule list (first match wins),
//! runs the selected codec through a content-addressed cache, applies the
//! size rollback policy and returns a [`BatchReport`] of mutations and
//! diagnostics. Mutations are published only after the whole batch settles.
//!
//! ```ignore
//! let registry = CodecRegistry::builtin();
//! let rules = PluginConfig::load(None, &cwd)?.rules(&registry)?;
//! let pipeline = Pipeline::new(registry, rules, Some(TransformCache::in_memory()))?;
//!
//! let report = pipeline.run(&assets);
//! assets.apply(&report);
//! ```

pub mod logger;

pub mod cache;
pub mod codec;
pub mod config;
pub mod host;
pub mod matcher;
pub mod pipeline;
pub mod rule;
pub mod transform;
pub mod utils;

pub use cache::{CacheStore, MemoryStore, TransformCache};
pub use codec::{Codec, CodecError, CodecId, CodecOptions, CodecRegistry, Format};
pub use pipeline::{Asset, AssetInfo, AssetSet, BatchReport, Diagnostic, Pipeline};
pub use rule::{Rule, RuleError};
