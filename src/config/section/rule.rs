//! `compress` and `[[convert]]` rule entries.
//!
//! # Example
//!
//! ```toml
//! compress = ["jpeg", { use = "png", include = "^static/" }]
//!
//! [[convert]]
//! use = ["png", "jpeg"]
//! to = "webp"
//! quality = 80
//! skip_if_larger = true
//! max_file_size_kb = 512
//! exclude = '\.min\.'
//! ```
//!
//! Keys other than the rule keys below are codec options and are passed to
//! the encoder untouched.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::codec::{CodecId, CodecOptions, CodecRegistry};
use crate::config::{ConfigDiagnostics, FieldPath};
use crate::matcher::{Condition, PathMatcher};
use crate::rule::Rule;

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// One rule as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    #[serde(rename = "use")]
    pub use_codecs: OneOrMany<String>,

    /// Target codec; conversions only.
    pub to: Option<String>,

    pub test: Option<OneOrMany<String>>,
    pub include: Option<OneOrMany<String>>,
    pub exclude: Option<OneOrMany<String>>,

    #[serde(alias = "skipIfLarger")]
    pub skip_if_larger: bool,

    /// Input ceiling in KB; fractions allowed.
    #[serde(alias = "maxFileSizeKB")]
    pub max_file_size_kb: Option<f64>,

    /// Legacy nested shape, rejected during validation.
    pub conversion: Option<Value>,

    /// Codec options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl RuleSpec {
    pub fn codec(name: &str) -> Self {
        Self {
            use_codecs: OneOrMany::One(name.to_string()),
            ..Self::default()
        }
    }

    pub fn conversion(from: &[&str], to: &str) -> Self {
        Self {
            use_codecs: OneOrMany::Many(from.iter().map(|s| s.to_string()).collect()),
            to: Some(to.to_string()),
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn with_skip_if_larger(mut self, skip: bool) -> Self {
        self.skip_if_larger = skip;
        self
    }
}

/// `compress` entry: a bare codec name or a full rule table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompressEntry {
    Codec(String),
    Rule(RuleSpec),
}

impl CompressEntry {
    pub fn to_spec(&self) -> RuleSpec {
        match self {
            Self::Codec(name) => RuleSpec::codec(name),
            Self::Rule(spec) => spec.clone(),
        }
    }
}

/// Presets appended by `default_conversions = true`.
pub fn default_conversions() -> Vec<RuleSpec> {
    vec![
        RuleSpec::conversion(&["png"], "webp")
            .with_option("quality", 80)
            .with_skip_if_larger(true),
        RuleSpec::conversion(&["jpeg"], "webp")
            .with_option("quality", 80)
            .with_skip_if_larger(true),
        RuleSpec::conversion(&["png"], "avif")
            .with_option("quality", 60)
            .with_skip_if_larger(true),
        RuleSpec::conversion(&["jpeg"], "avif")
            .with_option("quality", 60)
            .with_skip_if_larger(true),
    ]
}

/// Compression set used when the config names no rule at all.
pub const DEFAULT_COMPRESS: [&str; 3] = ["jpeg", "png", "ico"];

/// Whether an entry describes a compression or a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Compress,
    Convert,
}

/// Turn one rule entry into a [`Rule`], reporting every problem under `path`.
///
/// Returns `None` when any error was recorded for this spec.
pub fn build_rule(
    spec: &RuleSpec,
    kind: RuleKind,
    path: &FieldPath,
    registry: &CodecRegistry,
    diag: &mut ConfigDiagnostics,
) -> Option<Rule> {
    let before = diag.len();

    if spec.conversion.is_some() {
        diag.error_with_hint(
            path.field("conversion"),
            "nested `conversion` table is not supported",
            "use a flat `to = \"webp\"` field on the rule",
        );
    }

    let sources = parse_sources(spec, kind, path, registry, diag);
    let target = parse_target(spec, kind, path, registry, diag);

    let max_input_size = match spec.max_file_size_kb {
        Some(kb) if !(kb.is_finite() && kb > 0.0) => {
            diag.error(
                path.field("max_file_size_kb"),
                format!("must be a number greater than 0, got {kb} (omit it to disable the limit)"),
            );
            None
        }
        // Saturating cast
        kb => kb.map(|kb| (kb * 1024.0).ceil() as u64),
    };

    let options = CodecOptions::from(spec.options.clone());
    if let Err(e) = options.quality() {
        diag.error(path.field("quality"), e.to_string());
    }

    let matcher = build_matcher(spec, &sources, path, diag);

    if diag.len() > before {
        return None;
    }

    let rule = match (kind, target) {
        (RuleKind::Convert, Some(to)) => Rule::convert(sources, to),
        (RuleKind::Compress, _) => Rule::compress(*sources.first()?),
        (RuleKind::Convert, None) => return None,
    };
    Some(
        rule.with_matcher(matcher?)
            .with_options(options)
            .with_max_input_size(max_input_size)
            .with_skip_if_larger(spec.skip_if_larger),
    )
}

fn parse_sources(
    spec: &RuleSpec,
    kind: RuleKind,
    path: &FieldPath,
    registry: &CodecRegistry,
    diag: &mut ConfigDiagnostics,
) -> Vec<CodecId> {
    let field = path.field("use");
    let names = spec.use_codecs.as_slice();

    if names.is_empty() {
        diag.error(field, "`use` must name at least one codec");
        return Vec::new();
    }
    if kind == RuleKind::Compress && names.len() > 1 {
        diag.error_with_hint(
            field,
            "a compress rule takes a single codec",
            "write one rule per codec",
        );
        return Vec::new();
    }

    let mut sources = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let field = match &spec.use_codecs {
            OneOrMany::One(_) => field.clone(),
            OneOrMany::Many(_) => field.index(i),
        };
        let Some(id) = parse_codec(name, &field, diag) else {
            continue;
        };
        match kind {
            RuleKind::Convert if !id.is_convertible() => {
                diag.error(field, format!("`{id}` cannot be used in a conversion"));
            }
            // Conversion sources are decoded by the target codec
            RuleKind::Compress if !registry.contains(id) => {
                diag.error(field, format!("unsupported format `{id}` (no codec registered)"));
            }
            _ if !sources.contains(&id) => sources.push(id),
            _ => {}
        }
    }
    sources
}

fn parse_target(
    spec: &RuleSpec,
    kind: RuleKind,
    path: &FieldPath,
    registry: &CodecRegistry,
    diag: &mut ConfigDiagnostics,
) -> Option<CodecId> {
    let field = path.field("to");
    match (kind, spec.to.as_deref()) {
        (RuleKind::Compress, None) => None,
        (RuleKind::Compress, Some(_)) => {
            diag.error_with_hint(
                field,
                "`to` is not allowed in a compress rule",
                "move this rule to a [[convert]] table",
            );
            None
        }
        (RuleKind::Convert, None) => {
            diag.error(field, "missing target codec `to`");
            None
        }
        (RuleKind::Convert, Some(name)) => {
            let id = parse_codec(name, &field, diag)?;
            if !id.is_convertible() {
                diag.error(field, format!("`{id}` cannot be a conversion target"));
                return None;
            }
            if !registry.contains(id) {
                diag.error(field, format!("unsupported format `{id}` (no codec registered)"));
                return None;
            }
            Some(id)
        }
    }
}

fn parse_codec(name: &str, field: &FieldPath, diag: &mut ConfigDiagnostics) -> Option<CodecId> {
    match CodecId::from_str(name) {
        Ok(id) => Some(id),
        Err(e) => {
            diag.error_with_hint(
                field.clone(),
                e.to_string(),
                format!(
                    "expected one of: {}",
                    CodecId::ALL.map(CodecId::as_str).join(", ")
                ),
            );
            None
        }
    }
}

/// Compile `test`/`include`/`exclude`; a missing `test` becomes the union
/// of the source codecs' default tests.
fn build_matcher(
    spec: &RuleSpec,
    sources: &[CodecId],
    path: &FieldPath,
    diag: &mut ConfigDiagnostics,
) -> Option<PathMatcher> {
    let mut compile = |name: &str, patterns: &[String]| -> Option<Option<Condition>> {
        match Condition::new(patterns) {
            Ok(condition) => Some(Some(condition)),
            Err(e) => {
                diag.error(path.field(name), format!("invalid regex: {e}"));
                None
            }
        }
    };

    let test = match &spec.test {
        Some(patterns) => compile("test", patterns.as_slice()),
        None => {
            let mut defaults: Vec<String> = Vec::new();
            for id in sources {
                let pattern = id.default_test();
                if !defaults.iter().any(|p| p == pattern) {
                    defaults.push(pattern.to_string());
                }
            }
            compile("test", &defaults)
        }
    };
    let include = match &spec.include {
        Some(patterns) => compile("include", patterns.as_slice()),
        None => Some(None),
    };
    let exclude = match &spec.exclude {
        Some(patterns) => compile("exclude", patterns.as_slice()),
        None => Some(None),
    };

    Some(PathMatcher {
        test: test?,
        include: include?,
        exclude: exclude?,
    })
}
