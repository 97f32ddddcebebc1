//! Image formats and codec identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Image format, derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpeg,
    Png,
    Ico,
    Svg,
    Avif,
    Webp,
}

impl Format {
    /// Canonical file extension (without dot).
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Ico => "ico",
            Self::Svg => "svg",
            Self::Avif => "avif",
            Self::Webp => "webp",
        }
    }

    /// Map a file extension (case-insensitive, without dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "ico" | "icon" => Some(Self::Ico),
            "svg" => Some(Self::Svg),
            "avif" => Some(Self::Avif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess the format of an asset name such as `static/image/a.png?v=1`.
    ///
    /// The query suffix is ignored. Names without a dot in their last
    /// segment have no format.
    pub fn guess(name: &str) -> Option<Self> {
        let file = name.split('?').next().unwrap_or(name);
        let last = file.rsplit('/').next().unwrap_or(file);
        let (_, ext) = last.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Identifier of a registered codec.
///
/// Several codecs may produce the same [`Format`] (`png` and `pngLossless`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodecId {
    Jpeg,
    Png,
    PngLossless,
    Ico,
    Svg,
    Avif,
    Webp,
}

/// Codec name that matches no [`CodecId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported format `{0}`")]
pub struct UnknownCodec(pub String);

impl CodecId {
    pub const ALL: [Self; 7] = [
        Self::Jpeg,
        Self::Png,
        Self::PngLossless,
        Self::Ico,
        Self::Svg,
        Self::Avif,
        Self::Webp,
    ];

    /// Name as written in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::PngLossless => "pngLossless",
            Self::Ico => "ico",
            Self::Svg => "svg",
            Self::Avif => "avif",
            Self::Webp => "webp",
        }
    }

    /// Format produced (and consumed, for compression) by this codec.
    pub const fn format(self) -> Format {
        match self {
            Self::Jpeg => Format::Jpeg,
            Self::Png | Self::PngLossless => Format::Png,
            Self::Ico => Format::Ico,
            Self::Svg => Format::Svg,
            Self::Avif => Format::Avif,
            Self::Webp => Format::Webp,
        }
    }

    /// Primary codec for a format.
    pub const fn for_format(format: Format) -> Self {
        match format {
            Format::Jpeg => Self::Jpeg,
            Format::Png => Self::Png,
            Format::Ico => Self::Ico,
            Format::Svg => Self::Svg,
            Format::Avif => Self::Avif,
            Format::Webp => Self::Webp,
        }
    }

    /// Whether the codec may appear in a conversion rule (`use` or `to`).
    pub const fn is_convertible(self) -> bool {
        !matches!(self, Self::Svg | Self::Ico)
    }

    /// Baseline path predicate used when a rule has no `test`.
    pub const fn default_test(self) -> &'static str {
        match self {
            Self::Jpeg => r"\.(?:jpg|jpeg)$",
            Self::Png | Self::PngLossless => r"\.png$",
            Self::Ico => r"\.(?:ico|icon)$",
            Self::Svg => r"\.svg$",
            Self::Avif => r"\.avif$",
            Self::Webp => r"\.webp$",
        }
    }
}

impl FromStr for CodecId {
    type Err = UnknownCodec;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .or(match s {
                "jpg" => Some(Self::Jpeg),
                "png-lossless" | "png_lossless" => Some(Self::PngLossless),
                _ => None,
            })
            .ok_or_else(|| UnknownCodec(s.to_string()))
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_guess() {
        assert_eq!(Format::guess("static/image/a.png"), Some(Format::Png));
        assert_eq!(Format::guess("a.JPG"), Some(Format::Jpeg));
        assert_eq!(Format::guess("icons/fav.icon"), Some(Format::Ico));
        assert_eq!(Format::guess("a.webp?v=3"), Some(Format::Webp));
        assert_eq!(Format::guess("dir.png/readme"), None);
        assert_eq!(Format::guess("main.js"), None);
        assert_eq!(Format::guess("LICENSE"), None);
    }

    #[test]
    fn test_codec_names_roundtrip() {
        for id in CodecId::ALL {
            assert_eq!(id.as_str().parse::<CodecId>(), Ok(id));
        }
        assert_eq!("jpg".parse::<CodecId>(), Ok(CodecId::Jpeg));
        assert_eq!(
            "gif".parse::<CodecId>(),
            Err(UnknownCodec("gif".to_string()))
        );
    }

    #[test]
    fn test_codec_format_mapping() {
        assert_eq!(CodecId::PngLossless.format(), Format::Png);
        assert_eq!(CodecId::for_format(Format::Png), CodecId::Png);
        assert!(!CodecId::Svg.is_convertible());
        assert!(!CodecId::Ico.is_convertible());
        assert!(CodecId::Avif.is_convertible());
    }

    #[test]
    fn test_codec_serde_names() {
        let json = serde_json::to_string(&CodecId::PngLossless).unwrap();
        assert_eq!(json, "\"pngLossless\"");
        let json = serde_json::to_string(&Format::Webp).unwrap();
        assert_eq!(json, "\"webp\"");
    }
}
