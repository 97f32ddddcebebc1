//! Batch orchestration.
//!
//! ```text
//! AssetSet ──filter──> candidates ──par_iter──> match_rule ──> transform
//!                                                                  │
//! AssetSet <──apply── BatchReport <──collect (wait for all)────────┘
//! ```
//!
//! Every candidate is evaluated independently on the rayon pool; the only
//! shared state is the read-only registry and rules plus the cache. The
//! report is assembled after all evaluations settle, in asset-name order,
//! and nothing is published before that.

mod asset;
mod report;

pub use asset::{Asset, AssetInfo, AssetSet};
pub use report::{AssetMutation, BatchReport, BatchStats, Diagnostic, Severity};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::cache::TransformCache;
use crate::codec::CodecRegistry;
use crate::logger::ProgressLine;
use crate::matcher::match_rule;
use crate::rule::{Rule, RuleError};
use crate::transform::{Action, TransformContext, TransformResult, transform};
use crate::utils::format_file_size;

/// Progress counter name used by [`Pipeline::run_with_progress`].
pub const PROGRESS_COUNTER: &str = "images";

/// Validated rules bound to a registry and an optional cache.
#[derive(Debug)]
pub struct Pipeline {
    registry: CodecRegistry,
    rules: Vec<Rule>,
    cache: Option<TransformCache>,
    cache_conversions: bool,
    context: Option<String>,
}

/// Outcome of one candidate.
struct Evaluated<'a> {
    asset: &'a Asset,
    rule: usize,
    result: TransformResult,
}

impl Pipeline {
    /// Validate `rules` against `registry`.
    ///
    /// Fails on the first rule that names a codec the registry lacks, before
    /// any asset is touched.
    pub fn new(
        registry: CodecRegistry,
        rules: Vec<Rule>,
        cache: Option<TransformCache>,
    ) -> Result<Self, RuleError> {
        for (index, rule) in rules.iter().enumerate() {
            rule.validate(index, &registry)?;
        }
        Ok(Self {
            registry,
            rules,
            cache,
            cache_conversions: false,
            context: None,
        })
    }

    /// Also memoize conversion outputs.
    pub fn with_cache_conversions(mut self, enabled: bool) -> Self {
        self.cache_conversions = enabled;
        self
    }

    /// Context shown in diagnostics (e.g. the output directory).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub const fn cache(&self) -> Option<&TransformCache> {
        self.cache.as_ref()
    }

    /// Assets the next run would submit to the matcher.
    pub fn candidates<'a>(&self, assets: &'a AssetSet) -> Vec<&'a Asset> {
        assets
            .iter()
            .filter(|asset| !asset.is_reference() && !asset.info().is_processed())
            .collect()
    }

    pub fn run(&self, assets: &AssetSet) -> BatchReport {
        self.run_with_progress(assets, None)
    }

    /// Run one batch; `progress` gets one [`PROGRESS_COUNTER`] tick per
    /// candidate.
    pub fn run_with_progress(
        &self,
        assets: &AssetSet,
        progress: Option<&ProgressLine>,
    ) -> BatchReport {
        let candidates = self.candidates(assets);
        let ctx = TransformContext::new(&self.registry)
            .with_cache(self.cache.as_ref(), self.cache_conversions);

        let evaluated: Vec<Option<Evaluated<'_>>> = candidates
            .par_iter()
            .map(|&asset| {
                let outcome = self.evaluate(asset, &ctx);
                if let Some(progress) = progress {
                    progress.inc(PROGRESS_COUNTER);
                }
                outcome
            })
            .collect();

        let mut report = BatchReport::default();
        report.stats.candidates = candidates.len();
        self.collect(assets, evaluated.into_iter().flatten(), &mut report);
        report
    }

    fn evaluate<'a>(&self, asset: &'a Asset, ctx: &TransformContext<'_>) -> Option<Evaluated<'a>> {
        let format = asset.format()?;
        let (index, rule) = match_rule(asset.name(), format, &self.rules)?;
        crate::debug!("match"; "{} -> rule #{}", asset.name(), index);

        Some(Evaluated {
            asset,
            rule: index,
            result: transform(asset, rule, ctx),
        })
    }

    fn collect<'a>(
        &self,
        assets: &AssetSet,
        evaluated: impl Iterator<Item = Evaluated<'a>>,
        report: &mut BatchReport,
    ) {
        let context = self.context.as_deref();
        // Output name -> source name, to catch two conversions landing on one path
        let mut outputs: FxHashMap<String, String> = FxHashMap::default();

        for Evaluated { asset, rule, result } in evaluated {
            report.stats.matched += 1;
            let name = asset.name();

            let output = match result {
                TransformResult::Success(output) => output,
                TransformResult::Rejected(rejection) => {
                    crate::debug!("skip"; "{} (rule #{}): {}", name, rule, rejection);
                    report.stats.skipped += 1;
                    report
                        .diagnostics
                        .push(Diagnostic::warning(name, rejection.to_string()).with_context(context));
                    continue;
                }
                TransformResult::Failed(error) => {
                    report.stats.failed += 1;
                    report
                        .diagnostics
                        .push(Diagnostic::error(name, error.chain_message()).with_context(context));
                    continue;
                }
            };

            // A conversion never replaces an asset of the input set, which
            // also keeps it off the source of any other mutation
            if output.action == Action::Convert && assets.contains(&output.path) {
                report.stats.skipped += 1;
                report.diagnostics.push(
                    Diagnostic::warning(
                        name,
                        format!("Output `{}` already exists, conversion skipped", output.path),
                    )
                    .with_context(context),
                );
                continue;
            }
            if let Some(first) = outputs.get(&output.path) {
                report.stats.skipped += 1;
                report.diagnostics.push(
                    Diagnostic::warning(
                        name,
                        format!("Output `{}` already produced from `{}`", output.path, first),
                    )
                    .with_context(context),
                );
                continue;
            }
            outputs.insert(output.path.clone(), name.to_string());

            report.stats.bytes_before += asset.size() as u64;
            report.stats.bytes_after += output.bytes.len() as u64;
            crate::debug!(
                output.action.noun();
                "{} -> {} ({} -> {})",
                name,
                output.path,
                format_file_size(asset.size()),
                format_file_size(output.bytes.len())
            );

            let mutation = match output.action {
                Action::Compress => {
                    report.stats.compressed += 1;
                    AssetMutation::Update {
                        name: name.to_string(),
                        content: output.bytes,
                        info: asset.info().minimized(),
                    }
                }
                Action::Convert => {
                    report.stats.converted += 1;
                    AssetMutation::Replace {
                        from: name.to_string(),
                        info: asset.info().converted(output.original_format, output.format),
                        to: output.path,
                        content: output.bytes,
                    }
                }
            };
            report.mutations.push(mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, CodecError, CodecId, CodecOptions};
    use crate::matcher::{Condition, PathMatcher};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Encoder double: output of `len` bytes derived from the input, counting calls.
    fn counting(id: CodecId, len: usize, calls: &Arc<AtomicUsize>) -> Codec {
        let calls = Arc::clone(calls);
        Codec::from_fn(id, move |input, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.iter().copied().cycle().take(len).collect())
        })
    }

    fn fixed(id: CodecId, len: usize) -> Codec {
        counting(id, len, &Arc::new(AtomicUsize::new(0)))
    }

    fn set(assets: &[(&str, usize)]) -> AssetSet {
        assets
            .iter()
            .map(|(name, len)| Asset::new(*name, vec![7u8; *len]))
            .collect()
    }

    #[test]
    fn test_new_rejects_unregistered_codec() {
        let registry = CodecRegistry::empty().with(fixed(CodecId::Jpeg, 1));
        let err = Pipeline::new(
            registry,
            vec![Rule::compress(CodecId::Jpeg), Rule::convert([CodecId::Jpeg], CodecId::Avif)],
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnsupportedFormat {
                index: 1,
                codec: CodecId::Avif
            }
        ));
    }

    #[test]
    fn test_jpeg_to_webp_scenario() {
        let registry = CodecRegistry::empty().with(fixed(CodecId::Webp, 6_000));
        let rule = Rule::convert([CodecId::Jpeg], CodecId::Webp)
            .with_options(CodecOptions::new().with("quality", 80));
        let pipeline = Pipeline::new(registry, vec![rule], None).unwrap();

        let mut assets = set(&[("name.jpeg", 10_000)]);
        let report = pipeline.run(&assets);
        assets.apply(&report);

        assert!(!assets.contains("name.jpeg"));
        let output = assets.get("name.webp").unwrap();
        assert_eq!(output.size(), 6_000);
        assert!(output.info().converted);
        assert_eq!(report.stats.converted, 1);
        assert_eq!(report.stats.bytes_saved(), 4_000);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_max_file_size_scenario() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CodecRegistry::empty().with(counting(CodecId::Png, 10, &calls));
        let rule = Rule::compress(CodecId::Png).with_max_input_size(Some(1024));
        let pipeline = Pipeline::new(registry, vec![rule], None)
            .unwrap()
            .with_context("dist");

        let mut assets = set(&[("logo.png", 2_048)]);
        let report = pipeline.run(&assets);
        assets.apply(&report);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(assets.get("logo.png").unwrap().size(), 2_048);
        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].asset, "logo.png");
        assert!(warnings[0].to_string().contains("in \"dist\""));
        assert!(!report.has_errors());
    }

    #[test]
    fn test_first_match_wins_scenario() {
        let registry = CodecRegistry::empty()
            .with(fixed(CodecId::Webp, 5))
            .with(fixed(CodecId::Avif, 4));
        let rules = vec![
            Rule::convert([CodecId::Jpeg], CodecId::Webp),
            Rule::convert([CodecId::Jpeg], CodecId::Avif),
        ];
        let pipeline = Pipeline::new(registry, rules, None).unwrap();

        let mut assets = set(&[("a.jpeg", 10)]);
        assets.apply(&pipeline.run(&assets));

        assert!(assets.contains("a.webp"));
        assert!(!assets.contains("a.avif"));
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn test_codec_failure_scenario() {
        let registry = CodecRegistry::empty()
            .with(Codec::from_fn(CodecId::Avif, |_, _| {
                Err(CodecError::encode(CodecId::Avif, "malformed input"))
            }))
            .with(fixed(CodecId::Png, 2));
        let rules = vec![
            Rule::convert([CodecId::Jpeg], CodecId::Avif),
            Rule::compress(CodecId::Png),
        ];
        let pipeline = Pipeline::new(registry, rules, None).unwrap();

        let mut assets = set(&[("bad.jpeg", 32), ("ok.png", 8)]);
        let original = Arc::clone(assets.get("bad.jpeg").unwrap().content());
        let report = pipeline.run(&assets);
        assets.apply(&report);

        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].asset, "bad.jpeg");
        assert_eq!(assets.get("bad.jpeg").unwrap().content(), &original);
        // Sibling still processed
        assert!(assets.get("ok.png").unwrap().info().minimized);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.compressed, 1);
    }

    #[test]
    fn test_skip_if_larger_leaves_set_unchanged() {
        let registry = CodecRegistry::empty().with(fixed(CodecId::Webp, 100));
        let rule = Rule::convert([CodecId::Png], CodecId::Webp).with_skip_if_larger(true);
        let pipeline = Pipeline::new(registry, vec![rule], None).unwrap();

        let mut assets = set(&[("tiny.png", 10)]);
        let report = pipeline.run(&assets);
        assets.apply(&report);

        assert!(report.mutations.is_empty());
        assert_eq!(assets.names().collect::<Vec<_>>(), ["tiny.png"]);
        assert_eq!(assets.get("tiny.png").unwrap().size(), 10);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_processed_assets_never_resubmitted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CodecRegistry::empty().with(counting(CodecId::Png, 4, &calls));
        let pipeline = Pipeline::new(registry, vec![Rule::compress(CodecId::Png)], None).unwrap();

        let mut assets = set(&[("a.png", 8)]);
        assets.emit(Asset::with_info(
            "done.png",
            vec![1u8; 8],
            AssetInfo::default().minimized(),
        ));

        assets.apply(&pipeline.run(&assets));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second pass over the published set: everything is finalized
        let second = pipeline.run(&assets);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.stats.candidates, 0);
    }

    #[test]
    fn test_references_are_filtered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CodecRegistry::empty().with(counting(CodecId::Png, 4, &calls));
        let pipeline = Pipeline::new(registry, vec![Rule::compress(CodecId::Png)], None).unwrap();

        let assets = set(&[("a.png?url", 8), ("b.png?inline", 8), ("c.png?v=3", 8)]);
        let report = pipeline.run(&assets);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.mutations[0].output_name(), "c.png?v=3");
    }

    #[test]
    fn test_cold_and_warm_cache_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CodecRegistry::empty().with(counting(CodecId::Jpeg, 5, &calls));
        let pipeline = Pipeline::new(
            registry,
            vec![Rule::compress(CodecId::Jpeg)],
            Some(TransformCache::in_memory()),
        )
        .unwrap();

        let assets = set(&[("a.jpg", 64), ("b/a-copy.jpg", 64)]);
        let cold = pipeline.run(&assets);
        let warm = pipeline.run(&assets);

        let bytes = |report: &BatchReport| -> Vec<Vec<u8>> {
            report.mutations.iter().map(|m| m.content().to_vec()).collect()
        };
        assert_eq!(bytes(&cold), bytes(&warm));
        // Same content under two names: one encode for the whole lifetime
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = pipeline.cache().unwrap().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 3);
    }

    #[test]
    fn test_colliding_conversion_outputs() {
        let registry = CodecRegistry::empty().with(fixed(CodecId::Webp, 2));
        let rule = Rule::convert([CodecId::Png, CodecId::Jpeg], CodecId::Webp);
        let pipeline = Pipeline::new(registry, vec![rule], None).unwrap();

        let mut assets = set(&[("a.jpeg", 8), ("a.png", 8)]);
        let report = pipeline.run(&assets);
        assets.apply(&report);

        assert_eq!(report.mutations.len(), 1);
        assert_eq!(report.warnings().count(), 1);
        assert!(assets.contains("a.webp"));
        assert!(assets.contains("a.png"));
        assert!(!assets.contains("a.jpeg"));
    }

    #[test]
    fn test_conversion_keeps_existing_output() {
        let registry = CodecRegistry::empty().with(Codec::from_fn(CodecId::Webp, |_, _| {
            Ok(b"converted-from-png".to_vec())
        }));
        let rule = Rule::convert([CodecId::Png], CodecId::Webp);
        let pipeline = Pipeline::new(registry, vec![rule], None).unwrap();

        let mut assets: AssetSet = [
            Asset::new("a.png", b"png-bytes".to_vec()),
            Asset::new("a.webp", b"hand-made-webp".to_vec()),
        ]
        .into_iter()
        .collect();
        let report = pipeline.run(&assets);
        assets.apply(&report);

        assert!(report.mutations.is_empty());
        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].asset, "a.png");
        assert!(warnings[0].message.contains("`a.webp` already exists"));
        assert_eq!(&**assets.get("a.png").unwrap().content(), b"png-bytes");
        assert_eq!(&**assets.get("a.webp").unwrap().content(), b"hand-made-webp");
    }

    #[test]
    fn test_chained_conversions_never_drop_a_source() {
        let registry = CodecRegistry::empty()
            .with(Codec::from_fn(CodecId::Webp, |_, _| Ok(b"webp-from-png".to_vec())))
            .with(Codec::from_fn(CodecId::Avif, |input, _| {
                Ok([b"avif-from:".as_slice(), input].concat())
            }));
        let rules = vec![
            Rule::convert([CodecId::Png], CodecId::Webp),
            Rule::convert([CodecId::Webp], CodecId::Avif),
        ];
        let pipeline = Pipeline::new(registry, rules, None).unwrap();

        let mut assets: AssetSet = [
            Asset::new("a.png", b"png-bytes".to_vec()),
            Asset::new("a.webp", b"orig-webp".to_vec()),
        ]
        .into_iter()
        .collect();
        let report = pipeline.run(&assets);
        assets.apply(&report);

        // The webp moves on to avif; the png stays where it was
        assert_eq!(assets.names().collect::<Vec<_>>(), ["a.avif", "a.png"]);
        assert_eq!(&**assets.get("a.png").unwrap().content(), b"png-bytes");
        assert_eq!(&**assets.get("a.avif").unwrap().content(), b"avif-from:orig-webp");
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.warnings().next().unwrap().asset, "a.png");
    }

    #[test]
    fn test_matcher_restricts_rule() {
        let registry = CodecRegistry::empty().with(fixed(CodecId::Png, 2));
        let matcher = PathMatcher {
            include: Some(Condition::new(&["^static/"]).unwrap()),
            ..PathMatcher::default()
        };
        let rule = Rule::compress(CodecId::Png).with_matcher(matcher);
        let pipeline = Pipeline::new(registry, vec![rule], None).unwrap();

        let assets = set(&[("static/a.png", 8), ("public/b.png", 8)]);
        let report = pipeline.run(&assets);

        assert_eq!(report.stats.candidates, 2);
        assert_eq!(report.stats.matched, 1);
        assert_eq!(report.mutations[0].output_name(), "static/a.png");
    }

    #[test]
    fn test_many_assets_in_parallel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CodecRegistry::empty().with(counting(CodecId::Png, 1, &calls));
        let pipeline = Pipeline::new(registry, vec![Rule::compress(CodecId::Png)], None).unwrap();

        let assets: AssetSet = (0..200)
            .map(|i| Asset::new(format!("img/{i:03}.png"), vec![i as u8; 4]))
            .collect();
        let report = pipeline.run(&assets);

        assert_eq!(calls.load(Ordering::SeqCst), 200);
        let names: Vec<_> = report.mutations.iter().map(AssetMutation::output_name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
