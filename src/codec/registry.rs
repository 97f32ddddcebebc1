//! Codec capabilities and the immutable registry.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use super::{CodecError, CodecId, CodecOptions, builtin};

/// Encode capability of a codec.
///
/// Implemented for any `Fn(&[u8], &CodecOptions) -> Result<Vec<u8>, CodecError>`,
/// which keeps test doubles one closure away.
pub trait Encoder: Send + Sync {
    fn encode(&self, input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError>;
}

impl<F> Encoder for F
where
    F: Fn(&[u8], &CodecOptions) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    fn encode(&self, input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
        self(input, options)
    }
}

/// A registered codec: encoder plus default options and default path test.
#[derive(Clone)]
pub struct Codec {
    id: CodecId,
    encoder: Arc<dyn Encoder>,
    defaults: CodecOptions,
}

impl Codec {
    pub fn new(id: CodecId, encoder: impl Encoder + 'static) -> Self {
        Self {
            id,
            encoder: Arc::new(encoder),
            defaults: CodecOptions::new(),
        }
    }

    /// Codec backed by a closure.
    pub fn from_fn<F>(id: CodecId, encode: F) -> Self
    where
        F: Fn(&[u8], &CodecOptions) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
    {
        Self::new(id, encode)
    }

    pub fn with_defaults(mut self, defaults: CodecOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub const fn id(&self) -> CodecId {
        self.id
    }

    pub const fn defaults(&self) -> &CodecOptions {
        &self.defaults
    }

    /// Regex applied to asset names when a rule has no `test`.
    pub const fn default_test(&self) -> &'static str {
        self.id.default_test()
    }

    pub fn encode(&self, input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
        self.encoder.encode(input, options)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("id", &self.id)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Mapping from codec id to capability. Built once, never mutated after.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: FxHashMap<CodecId, Codec>,
}

impl CodecRegistry {
    /// Registry without any codec.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in encoder.
    pub fn builtin() -> Self {
        Self::empty()
            .with(
                Codec::new(CodecId::Jpeg, builtin::encode_jpeg)
                    .with_defaults(CodecOptions::new().with("quality", 80)),
            )
            .with(Codec::new(CodecId::Png, builtin::encode_png))
            .with(Codec::new(CodecId::PngLossless, builtin::encode_png_lossless))
            .with(Codec::new(CodecId::Ico, builtin::encode_ico))
            .with(
                Codec::new(CodecId::Svg, builtin::encode_svg)
                    .with_defaults(CodecOptions::new().with("precision", 3)),
            )
            .with(
                Codec::new(CodecId::Avif, builtin::encode_avif)
                    .with_defaults(CodecOptions::new().with("quality", 60).with("speed", 6)),
            )
            .with(Codec::new(CodecId::Webp, builtin::encode_webp))
    }

    /// Add (or replace) a codec.
    pub fn with(mut self, codec: Codec) -> Self {
        self.codecs.insert(codec.id(), codec);
        self
    }

    pub fn lookup(&self, id: CodecId) -> Result<&Codec, CodecError> {
        self.codecs.get(&id).ok_or(CodecError::Unsupported(id))
    }

    pub fn contains(&self, id: CodecId) -> bool {
        self.codecs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
