//! `imgshrink build`: one batch over an output directory.
//!
//! Phases:
//! - **Config** - load `imgshrink.toml`, normalize and validate rules
//! - **Load** - scan the directory into an asset set
//! - **Run** - parallel batch with a progress line
//! - **Publish** - write outputs and remove converted sources (unless `--dry-run`)
//! - **Report** - summary or JSON, warnings and errors

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use imgshrink::{
    cache::TransformCache,
    codec::CodecRegistry,
    config::PluginConfig,
    host::{DiskStore, ReportJson, load_dir, print_diagnostics, print_summary, write_report},
    log,
    logger::ProgressLine,
    pipeline::{PROGRESS_COUNTER, Pipeline},
    utils::plural_count,
};

use super::{BuildArgs, Cli, Mode};

/// Run the build command.
pub fn run_build(cli: &Cli, args: &BuildArgs) -> Result<()> {
    imgshrink::logger::set_verbose(args.verbose);

    // The caller decides; the pipeline itself never looks at the mode
    if args.mode == Mode::Development {
        log!("build"; "development mode, images left untouched");
        return Ok(());
    }

    let dir = fs::canonicalize(&args.dir)
        .with_context(|| format!("Output directory `{}` not found", args.dir.display()))?;
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;

    let config = PluginConfig::load(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &config.config_path {
        imgshrink::debug!("config"; "using {}", path.display());
    }

    let registry = CodecRegistry::builtin();
    let rules = config.rules(&registry)?;
    let cache = open_cache(&config, args)?;
    let pipeline = Pipeline::new(registry, rules, cache)?
        .with_cache_conversions(config.cache.conversions)
        .with_context(dir.display().to_string());

    let assets = load_dir(&dir)?;
    let candidates = pipeline.candidates(&assets).len();
    let progress = (!args.json && candidates > 0)
        .then(|| ProgressLine::new(&[(PROGRESS_COUNTER, candidates)]));

    let report = pipeline.run_with_progress(&assets, progress.as_ref());
    if let Some(progress) = progress {
        progress.finish();
    }

    if args.dry_run {
        imgshrink::debug!("build"; "dry run, {} not written", plural_count(report.mutations.len(), "file"));
    } else {
        let written = write_report(&dir, &report)?;
        imgshrink::debug!(
            "build";
            "wrote {}, removed {}",
            plural_count(written.written, "file"),
            plural_count(written.removed, "file")
        );
    }

    let cache_stats = pipeline.cache().map(TransformCache::stats);
    if args.json {
        let json = serde_json::to_string_pretty(&ReportJson::new(&report, cache_stats))?;
        println!("{json}");
    } else {
        print_summary(&report, &assets);
        if let Some(stats) = cache_stats
            && stats.hits + stats.misses > 0
        {
            imgshrink::debug!("cache"; "{} hits, {} misses", stats.hits, stats.misses);
        }
        print_diagnostics(&report);
    }

    if report.has_errors() {
        bail!(
            "{} during image optimization",
            plural_count(report.errors().count(), "error")
        );
    }
    Ok(())
}

/// Persistent cache unless disabled; `--dry-run` keeps it in memory.
fn open_cache(config: &PluginConfig, args: &BuildArgs) -> Result<Option<TransformCache>> {
    if args.clean_cache {
        let dir = config.cache.resolved_dir(&config.root);
        clear_cache(&dir)?;
    }
    if args.no_cache {
        return Ok(None);
    }

    let cache = match config.cache_dir() {
        Some(dir) if !args.dry_run => {
            imgshrink::debug!("cache"; "persistent cache at {}", dir.display());
            TransformCache::new(DiskStore::new(dir))
        }
        _ => TransformCache::in_memory(),
    };
    Ok(Some(cache))
}

fn clear_cache(dir: &Path) -> Result<()> {
    DiskStore::new(dir)
        .clear()
        .with_context(|| format!("Failed to clear cache at {}", dir.display()))?;
    log!("cache"; "cleared {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use clap::Parser;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    const CONVERT_PNG: &str = "[[convert]]\nuse = \"png\"\nto = \"webp\"\n";

    fn png(size: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(size, size, |x, y| {
            Rgba([(x * 8) as u8, (y * 8) as u8, 64, 255])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Project root with `imgshrink.toml` and `dist/logo.png`.
    fn project(config: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("imgshrink.toml"), config).unwrap();
        fs::create_dir_all(root.path().join("dist")).unwrap();
        fs::write(root.path().join("dist/logo.png"), png(16)).unwrap();
        root
    }

    fn build(root: &Path, extra: &[&str]) -> Result<()> {
        let mut argv = vec![
            "imgshrink".to_string(),
            "-C".to_string(),
            root.join("imgshrink.toml").display().to_string(),
            "build".to_string(),
            root.join("dist").display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));

        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Build { args } = &cli.command;
        run_build(&cli, args)
    }

    #[test]
    fn test_build_converts_in_place() {
        let root = project(CONVERT_PNG);
        build(root.path(), &[]).unwrap();

        let dist = root.path().join("dist");
        assert!(!dist.join("logo.png").exists());
        let webp = fs::read(dist.join("logo.webp")).unwrap();
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_development_mode_leaves_images() {
        let root = project(CONVERT_PNG);
        build(root.path(), &["--mode", "development"]).unwrap();

        let dist = root.path().join("dist");
        assert_eq!(fs::read(dist.join("logo.png")).unwrap(), png(16));
        assert!(!dist.join("logo.webp").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let root = project("compress = [\"png\"]\n");
        build(root.path(), &["-n"]).unwrap();

        assert_eq!(fs::read(root.path().join("dist/logo.png")).unwrap(), png(16));
        assert!(!root.path().join(".imgshrink").exists());
    }

    #[test]
    fn test_compress_fills_persistent_cache() {
        let root = project("compress = [\"png\"]\n");
        build(root.path(), &[]).unwrap();
        assert!(root.path().join(".imgshrink/cache").is_dir());

        build(root.path(), &["--clean-cache", "--no-cache"]).unwrap();
        assert!(!root.path().join(".imgshrink/cache").exists());
    }

    #[test]
    fn test_codec_error_fails_after_publishing() {
        let root = project(CONVERT_PNG);
        fs::write(root.path().join("dist/broken.png"), b"not a png").unwrap();

        let err = build(root.path(), &[]).unwrap_err();
        assert!(err.to_string().contains("1 error"), "{err}");

        let dist = root.path().join("dist");
        assert!(dist.join("logo.webp").exists());
        assert_eq!(fs::read(dist.join("broken.png")).unwrap(), b"not a png");
    }
}
