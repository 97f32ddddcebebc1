//! Configuration management for `imgshrink.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── cache      # [cache]
//! │   └── rule       # compress / [[convert]] entries, normalization
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # PluginConfig (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! default_conversions = false
//! compress = ["jpeg", { use = "png", include = "^static/" }]
//!
//! [cache]
//! enable = true
//!
//! [[convert]]
//! use = "png"
//! to = "webp"
//! quality = 80
//! ```

pub mod section;
pub mod types;
mod util;

pub use section::{CacheConfig, CompressEntry, OneOrMany, RuleKind, RuleSpec};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use util::find_config_file;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::CodecRegistry;
use crate::log;
use crate::rule::Rule;
use section::{DEFAULT_COMPRESS, build_rule, default_conversions};

/// Default config file name.
pub const CONFIG_FILE: &str = "imgshrink.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing imgshrink.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative paths resolve against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Append the built-in png/jpeg → webp/avif conversions.
    pub default_conversions: bool,

    /// In-place compression rules.
    pub compress: Vec<CompressEntry>,

    /// Conversion rules.
    pub convert: Vec<RuleSpec>,

    /// Persistent cache settings.
    pub cache: CacheConfig,
}

impl PluginConfig {
    /// Load configuration for a build started in `start`.
    ///
    /// With `explicit = Some(path)` the file must exist. Otherwise
    /// [`CONFIG_FILE`] is searched upward from `start`, and built-in
    /// defaults apply when none is found.
    pub fn load(explicit: Option<&Path>, start: &Path) -> Result<Self, ConfigError> {
        let name = explicit.unwrap_or(Path::new(CONFIG_FILE));
        let Some(path) = find_config_file(name, start) else {
            if explicit.is_some() {
                return Err(ConfigError::io(
                    name,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            crate::debug!("config"; "no {} found, using defaults", CONFIG_FILE);
            return Ok(Self {
                root: start.to_path_buf(),
                ..Self::default()
            });
        };

        let mut config = Self::from_path(&path)?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.config_path = Some(path);
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(Self::parse_with_ignored(content)?.0)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Normalize and validate every rule against `registry`.
    ///
    /// Conversion rules come first (file order, then presets), compression
    /// rules after. All problems are collected before failing.
    pub fn rules(&self, registry: &CodecRegistry) -> Result<Vec<Rule>, ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        let mut rules = Vec::new();

        let mut push = |spec: &RuleSpec, kind: RuleKind, path: FieldPath, diag: &mut ConfigDiagnostics| {
            if let Some(rule) = build_rule(spec, kind, &path, registry, diag) {
                rules.push(rule);
            }
        };

        for (i, spec) in self.convert.iter().enumerate() {
            push(spec, RuleKind::Convert, FieldPath::new("convert").index(i), &mut diag);
        }
        if self.default_conversions {
            for (i, spec) in default_conversions().iter().enumerate() {
                push(
                    spec,
                    RuleKind::Convert,
                    FieldPath::new("default_conversions").index(i),
                    &mut diag,
                );
            }
        }

        let compress: Vec<RuleSpec> = if self.compress.is_empty() && self.convert.is_empty() {
            DEFAULT_COMPRESS.iter().map(|name| RuleSpec::codec(name)).collect()
        } else {
            self.compress.iter().map(CompressEntry::to_spec).collect()
        };
        for (i, spec) in compress.iter().enumerate() {
            push(spec, RuleKind::Compress, FieldPath::new("compress").index(i), &mut diag);
        }

        diag.into_result()?;
        Ok(rules)
    }

    /// Cache directory, when the persistent cache is enabled.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache
            .enable
            .then(|| self.cache.resolved_dir(&self.root))
    }
}
