//! Codec error types.

use thiserror::Error;

use super::CodecId;

/// Failure of a single encode call.
///
/// Always carries the underlying cause; the pipeline turns it into a
/// path-qualified error diagnostic and keeps the original asset.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode input image")]
    Decode(#[source] image::ImageError),

    #[error("`{codec}` encoder failed")]
    Encode {
        codec: CodecId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to parse SVG")]
    Svg(#[source] usvg::Error),

    #[error("invalid `{key}` option: {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("codec `{0}` is not registered")]
    Unsupported(CodecId),

    #[error("cannot determine the image format of `{0}`")]
    UnknownFormat(String),
}

impl CodecError {
    /// Wrap an encoder-side failure.
    pub fn encode(
        codec: CodecId,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Encode {
            codec,
            source: source.into(),
        }
    }

    /// Full message including the chain of causes (`outer: inner: ...`).
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
