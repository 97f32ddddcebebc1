//! Declarative rules: which assets to touch and what to do with them.
//!
//! A rule without a target compresses matching assets in place; a rule with
//! a target converts them. Rules form an ordered list; see
//! [`crate::matcher::match_rule`] for the selection semantics.

use thiserror::Error;

use crate::codec::{CodecId, CodecOptions, CodecRegistry, Format};
use crate::matcher::PathMatcher;

/// Fatal rule-set problems, surfaced before any asset is processed.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule #{index}: unsupported format `{codec}` (no codec registered)")]
    UnsupportedFormat { index: usize, codec: CodecId },

    #[error("rule #{index}: {message}")]
    Configuration { index: usize, message: String },
}

/// A matcher plus the transformation applied to matching assets.
#[derive(Debug, Clone)]
pub struct Rule {
    sources: Vec<CodecId>,
    target: Option<CodecId>,
    matcher: PathMatcher,
    options: CodecOptions,
    max_input_size: Option<u64>,
    skip_if_larger: bool,
}

impl Rule {
    /// In-place compression of assets in the codec's format.
    pub fn compress(codec: CodecId) -> Self {
        Self {
            sources: vec![codec],
            target: None,
            matcher: PathMatcher::default(),
            options: CodecOptions::new(),
            max_input_size: None,
            skip_if_larger: false,
        }
    }

    /// Conversion of assets in any of `sources` to `to`.
    pub fn convert(sources: impl IntoIterator<Item = CodecId>, to: CodecId) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            target: Some(to),
            ..Self::compress(to)
        }
    }

    pub fn with_matcher(mut self, matcher: PathMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_input_size(mut self, bytes: Option<u64>) -> Self {
        self.max_input_size = bytes;
        self
    }

    pub fn with_skip_if_larger(mut self, skip: bool) -> Self {
        self.skip_if_larger = skip;
        self
    }

    pub fn sources(&self) -> &[CodecId] {
        &self.sources
    }

    pub const fn target(&self) -> Option<CodecId> {
        self.target
    }

    pub fn target_format(&self) -> Option<Format> {
        self.target.map(CodecId::format)
    }

    pub const fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub const fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub const fn max_input_size(&self) -> Option<u64> {
        self.max_input_size
    }

    pub const fn skip_if_larger(&self) -> bool {
        self.skip_if_larger
    }

    pub const fn is_conversion(&self) -> bool {
        self.target.is_some()
    }

    /// Source format membership.
    pub fn accepts(&self, format: Format) -> bool {
        self.sources.iter().any(|c| c.format() == format)
    }

    /// Codec invoked for an asset of `format`.
    ///
    /// Conversions use the target codec; compressions use the source codec
    /// listed for that format (so `pngLossless` is honored).
    pub fn codec_for(&self, format: Format) -> CodecId {
        self.target.unwrap_or_else(|| {
            self.sources
                .iter()
                .copied()
                .find(|c| c.format() == format)
                .unwrap_or(CodecId::for_format(format))
        })
    }

    /// Every codec this rule may invoke.
    fn invoked_codecs(&self) -> Vec<CodecId> {
        match self.target {
            Some(to) => vec![to],
            None => self.sources.clone(),
        }
    }

    /// Check the rule against the registry; `index` is its list position.
    pub fn validate(&self, index: usize, registry: &CodecRegistry) -> Result<(), RuleError> {
        let configuration = |message: String| RuleError::Configuration { index, message };

        if self.sources.is_empty() {
            return Err(configuration("`use` lists no source format".into()));
        }
        if self.max_input_size == Some(0) {
            return Err(configuration("`max_file_size_kb` must be greater than 0".into()));
        }
        if let Some(to) = self.target {
            if !to.is_convertible() {
                return Err(configuration(format!("`{to}` cannot be a conversion target")));
            }
            if let Some(source) = self.sources.iter().find(|c| !c.is_convertible()) {
                return Err(configuration(format!(
                    "`{source}` cannot be a conversion source"
                )));
            }
        }
        if let Some(codec) = self.invoked_codecs().into_iter().find(|c| !registry.contains(*c)) {
            return Err(RuleError::UnsupportedFormat { index, codec });
        }
        Ok(())
    }
}
