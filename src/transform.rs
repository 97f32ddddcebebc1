//! Single-asset transformation with the size rollback policy.
//!
//! [`transform`] never touches the asset set. It returns what should happen
//! to one asset and leaves publishing to the pipeline.

use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheKey, TransformCache};
use crate::codec::{CodecError, CodecId, CodecRegistry, Format};
use crate::matcher::strip_query;
use crate::pipeline::Asset;
use crate::rule::Rule;
use crate::utils::format_file_size;

/// What a successful transform did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Same path, same format.
    Compress,
    /// New extension, original deleted.
    Convert,
}

impl Action {
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Compress => "compression",
            Self::Convert => "conversion",
        }
    }
}

/// Replacement for one asset.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub action: Action,
    pub codec: CodecId,
    pub original_format: Format,
    pub format: Format,
    pub path: String,
    pub bytes: Arc<[u8]>,
}

/// Policy rejection: the asset stays as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InputTooLarge { action: Action, size: u64, limit: u64 },
    OutputLarger { action: Action, input: u64, output: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InputTooLarge { action, size, limit } => write!(
                f,
                "File too large for {} ({} > {})",
                action.noun(),
                format_file_size(size as usize),
                format_limit(limit)
            ),
            Self::OutputLarger { action, input, output } => {
                let mut noun = action.noun().to_string();
                noun[..1].make_ascii_uppercase();
                write!(
                    f,
                    "{noun} resulted in larger file ({} > {})",
                    format_file_size(output as usize),
                    format_file_size(input as usize)
                )
            }
        }
    }
}

/// Limits come from `max_file_size_kb`, so whole kilobytes print as `1KB`.
fn format_limit(bytes: u64) -> String {
    if bytes % 1024 == 0 {
        format!("{}KB", bytes / 1024)
    } else {
        format_file_size(bytes as usize)
    }
}

#[derive(Debug)]
pub enum TransformResult {
    Success(TransformOutput),
    Rejected(Rejection),
    Failed(CodecError),
}

/// Shared, read-only state for a batch of transforms.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub registry: &'a CodecRegistry,
    pub cache: Option<&'a TransformCache>,
    /// Also memoize conversion outputs (compression is always memoized
    /// when a cache is present).
    pub cache_conversions: bool,
}

impl<'a> TransformContext<'a> {
    pub const fn new(registry: &'a CodecRegistry) -> Self {
        Self {
            registry,
            cache: None,
            cache_conversions: false,
        }
    }

    pub const fn with_cache(mut self, cache: Option<&'a TransformCache>, conversions: bool) -> Self {
        self.cache = cache;
        self.cache_conversions = conversions;
        self
    }
}

/// Apply `rule` to `asset`.
pub fn transform(asset: &Asset, rule: &Rule, ctx: &TransformContext<'_>) -> TransformResult {
    let Some(source) = asset.format() else {
        return TransformResult::Failed(CodecError::UnknownFormat(asset.name().to_string()));
    };

    let action = match rule.target_format() {
        Some(target) if target != source => Action::Convert,
        _ => Action::Compress,
    };

    let size = asset.size() as u64;
    if let Some(limit) = rule.max_input_size()
        && size > limit
    {
        return TransformResult::Rejected(Rejection::InputTooLarge { action, size, limit });
    }

    let codec = match ctx.registry.lookup(rule.codec_for(source)) {
        Ok(codec) => codec,
        Err(e) => return TransformResult::Failed(e),
    };
    let options = rule.options().merged_over(codec.defaults());
    let encode = || codec.encode(asset.content(), &options);

    let cache = ctx
        .cache
        .filter(|_| action == Action::Compress || ctx.cache_conversions);
    let encoded = match cache {
        Some(cache) => {
            let key = CacheKey::new(CacheKey::namespace_for(codec.id(), &options), asset.hash());
            cache.get_or_compute(&key, encode)
        }
        None => encode().map(Arc::from),
    };
    let bytes = match encoded {
        Ok(bytes) => bytes,
        Err(e) => return TransformResult::Failed(e),
    };

    let output = bytes.len() as u64;
    if rule.skip_if_larger() && output > size {
        return TransformResult::Rejected(Rejection::OutputLarger {
            action,
            input: size,
            output,
        });
    }

    let format = codec.id().format();
    let path = match action {
        Action::Compress => asset.name().to_string(),
        Action::Convert => converted_path(asset.name(), format),
    };

    TransformResult::Success(TransformOutput {
        action,
        codec: codec.id(),
        original_format: source,
        format,
        path,
        bytes,
    })
}

/// Replace the extension of `name` with the one of `format`.
///
/// A `?query` suffix is kept; a name without extension gets one appended.
pub fn converted_path(name: &str, format: Format) -> String {
    let path = strip_query(name);
    let query = &name[path.len()..];
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem = match path[file_start..].rfind('.') {
        Some(dot) => &path[..file_start + dot],
        None => path,
    };
    format!("{stem}.{}{query}", format.extension())
}
