//! Terminal and JSON reporting of a batch.

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::log;
use crate::pipeline::{AssetInfo, AssetMutation, AssetSet, BatchReport, BatchStats, Diagnostic};
use crate::utils::{format_file_size, plural_count};

/// One line per transformed asset, then the totals.
///
/// `before` is the asset set the batch ran on, used for the input sizes.
pub fn print_summary(report: &BatchReport, before: &AssetSet) {
    for mutation in &report.mutations {
        let source = mutation.source_name();
        let input = before.get(source).map_or(0, |a| a.size());
        let output = mutation.content().len();

        match mutation {
            AssetMutation::Update { name, .. } => log!(
                "compress";
                "{} {} → {} {}",
                name,
                format_file_size(input),
                format_file_size(output),
                "[minimized]".bright_green()
            ),
            AssetMutation::Replace { from, to, .. } => log!(
                "convert";
                "{} → {} {} → {} {}",
                from,
                to,
                format_file_size(input),
                format_file_size(output),
                "[converted]".bright_green()
            ),
        }
    }

    let stats = &report.stats;
    if stats.matched == 0 {
        log!("build"; "no image matched any rule");
        return;
    }

    let saved = stats.bytes_saved();
    let saved = if saved >= 0 {
        format!("saved {}", format_file_size(saved as usize))
    } else {
        format!("grew by {}", format_file_size(saved.unsigned_abs() as usize))
    };
    log!(
        "build";
        "{} converted, {} compressed, {} skipped, {} failed ({})",
        plural_count(stats.converted, "image"),
        stats.compressed,
        stats.skipped,
        stats.failed,
        saved
    );
}

/// Warnings then errors, one block each.
pub fn print_diagnostics(report: &BatchReport) {
    for warning in report.warnings() {
        log!("warning"; "{}", warning);
    }
    for error in report.errors() {
        log!("error"; "{}", error);
    }
}

/// Machine-readable form of a batch (`--json`).
#[derive(Debug, Serialize)]
pub struct ReportJson<'a> {
    pub stats: &'a BatchStats,
    pub assets: Vec<AssetJson<'a>>,
    pub diagnostics: &'a [Diagnostic],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetJson<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub size: usize,
    pub info: &'a AssetInfo,
}

impl<'a> ReportJson<'a> {
    pub fn new(report: &'a BatchReport, cache: Option<CacheStats>) -> Self {
        let assets = report
            .mutations
            .iter()
            .map(|m| AssetJson {
                name: m.output_name(),
                source: m.source_name(),
                size: m.content().len(),
                info: m.info(),
            })
            .collect();
        Self {
            stats: &report.stats,
            assets,
            diagnostics: &report.diagnostics,
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Format;
    use std::sync::Arc;

    #[test]
    fn test_report_json_shape() {
        let report = BatchReport {
            mutations: vec![AssetMutation::Replace {
                from: "a.png".into(),
                to: "a.webp".into(),
                content: Arc::from(&b"1234"[..]),
                info: AssetInfo::default().converted(Format::Png, Format::Webp),
            }],
            diagnostics: vec![Diagnostic::warning("b.png", "File too large")],
            stats: BatchStats {
                converted: 1,
                ..BatchStats::default()
            },
        };

        let json = serde_json::to_value(ReportJson::new(&report, None)).unwrap();
        assert_eq!(json["assets"][0]["name"], "a.webp");
        assert_eq!(json["assets"][0]["source"], "a.png");
        assert_eq!(json["assets"][0]["size"], 4);
        assert_eq!(json["assets"][0]["info"]["converted"], true);
        assert_eq!(json["diagnostics"][0]["severity"], "warning");
        assert_eq!(json["stats"]["converted"], 1);
        assert!(json.get("cache").is_none());
    }
}
