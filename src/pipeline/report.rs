//! Batch results: mutations to publish, diagnostics, counters.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{Asset, AssetInfo, AssetSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Path-qualified message about one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub asset: String,
    pub message: String,
    /// Build context (usually the output directory) shown in the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn warning(asset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, asset, message)
    }

    pub fn error(asset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, asset, message)
    }

    fn new(severity: Severity, asset: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            asset: asset.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_string);
        self
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(
                f,
                "\"{}\" in \"{}\" from imgshrink:\n{}",
                self.asset, context, self.message
            ),
            None => write!(f, "\"{}\" from imgshrink:\n{}", self.asset, self.message),
        }
    }
}

/// Change to the asset set, applied after the batch completes.
#[derive(Debug, Clone)]
pub enum AssetMutation {
    /// New bytes under the same name.
    Update {
        name: String,
        content: Arc<[u8]>,
        info: AssetInfo,
    },
    /// Delete `from`, emit `to`.
    Replace {
        from: String,
        to: String,
        content: Arc<[u8]>,
        info: AssetInfo,
    },
}

impl AssetMutation {
    /// Name of the asset that exists after the mutation.
    pub fn output_name(&self) -> &str {
        match self {
            Self::Update { name, .. } => name,
            Self::Replace { to, .. } => to,
        }
    }

    /// Name of the asset the mutation was computed from.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Update { name, .. } => name,
            Self::Replace { from, .. } => from,
        }
    }

    pub fn content(&self) -> &Arc<[u8]> {
        match self {
            Self::Update { content, .. } | Self::Replace { content, .. } => content,
        }
    }

    pub const fn info(&self) -> &AssetInfo {
        match self {
            Self::Update { info, .. } | Self::Replace { info, .. } => info,
        }
    }
}

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Assets submitted to the matcher.
    pub candidates: usize,
    pub matched: usize,
    pub converted: usize,
    pub compressed: usize,
    /// Policy rejections.
    pub skipped: usize,
    pub failed: usize,
    /// Input size of transformed assets.
    pub bytes_before: u64,
    /// Output size of transformed assets.
    pub bytes_after: u64,
}

impl BatchStats {
    pub const fn bytes_saved(&self) -> i64 {
        self.bytes_before as i64 - self.bytes_after as i64
    }
}

/// Everything one batch produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub mutations: Vec<AssetMutation>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

impl AssetSet {
    /// Publish every mutation of a finished batch.
    pub fn apply(&mut self, report: &BatchReport) {
        for mutation in &report.mutations {
            match mutation {
                AssetMutation::Update {
                    name,
                    content,
                    info,
                } => {
                    self.update(name, Arc::clone(content), info.clone());
                }
                AssetMutation::Replace {
                    from,
                    to,
                    content,
                    info,
                } => {
                    self.delete(from);
                    self.emit(Asset::with_info(to.as_str(), Arc::clone(content), info.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let plain = Diagnostic::warning("a.png", "File too large");
        assert_eq!(plain.to_string(), "\"a.png\" from imgshrink:\nFile too large");

        let scoped = Diagnostic::error("a.png", "boom").with_context(Some("dist"));
        assert_eq!(scoped.to_string(), "\"a.png\" in \"dist\" from imgshrink:\nboom");
        assert!(scoped.is_error());
    }

    #[test]
    fn test_apply_replace_and_update() {
        let mut set: AssetSet = [
            Asset::new("a.png", b"png".to_vec()),
            Asset::new("b.jpeg", b"jpeg".to_vec()),
        ]
        .into_iter()
        .collect();

        let report = BatchReport {
            mutations: vec![
                AssetMutation::Replace {
                    from: "a.png".into(),
                    to: "a.webp".into(),
                    content: Arc::from(&b"w"[..]),
                    info: AssetInfo::default(),
                },
                AssetMutation::Update {
                    name: "b.jpeg".into(),
                    content: Arc::from(&b"j"[..]),
                    info: AssetInfo::default().minimized(),
                },
            ],
            ..BatchReport::default()
        };
        set.apply(&report);

        assert!(!set.contains("a.png"));
        assert_eq!(&**set.get("a.webp").unwrap().content(), b"w");
        assert!(set.get("b.jpeg").unwrap().info().minimized);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_bytes_saved_can_be_negative() {
        let stats = BatchStats {
            bytes_before: 10,
            bytes_after: 12,
            ..BatchStats::default()
        };
        assert_eq!(stats.bytes_saved(), -2);
    }
}
