//! Codec registry: format identifiers mapped to encode capabilities.
//!
//! # Modules
//!
//! - [`format`]: Closed set of formats and codec identifiers
//! - [`options`]: Opaque codec option maps (defaults merged with rule options)
//! - [`registry`]: `Encoder` trait, `Codec` capability and `CodecRegistry`
//! - [`builtin`]: Encoders backed by `image`, `ravif` and `usvg`
//!
//! The registry is an explicitly constructed, immutable value. It is built
//! once (usually [`CodecRegistry::builtin`]) and handed to the pipeline;
//! tests build reduced registries with closure encoders.

pub(crate) mod builtin;
mod error;
mod format;
mod options;
mod registry;

pub use error::CodecError;
pub use format::{CodecId, Format, UnknownCodec};
pub use options::CodecOptions;
pub use registry::{Codec, CodecRegistry, Encoder};
