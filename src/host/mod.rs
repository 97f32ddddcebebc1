//! The build-tool side of the pipeline for a plain output directory.
//!
//! - [`load_dir`]: scan a directory into an [`AssetSet`](crate::pipeline::AssetSet)
//! - [`write_report`]: publish a finished batch to disk
//! - [`DiskStore`]: persistent [`CacheStore`](crate::cache::CacheStore)
//! - [`print_summary`] / [`ReportJson`]: terminal and JSON reporting

mod disk;
mod dist;
mod summary;

pub use disk::DiskStore;
pub use dist::{WriteStats, load_dir, write_atomic, write_report};
pub use summary::{ReportJson, print_diagnostics, print_summary};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TransformCache;
    use crate::codec::CodecRegistry;
    use crate::codec::builtin::tests::sample_image;
    use crate::config::PluginConfig;
    use crate::pipeline::{BatchReport, Pipeline};
    use image::ImageFormat;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
        compress = ["jpeg"]

        [cache]
        conversions = true

        [[convert]]
        use = "png"
        to = "webp"
    "#;

    fn seed(dist: &Path) {
        fs::create_dir_all(dist.join("img")).unwrap();
        fs::write(dist.join("img/logo.png"), sample_image(ImageFormat::Png, 32, 32)).unwrap();
        fs::write(dist.join("photo.jpg"), sample_image(ImageFormat::Jpeg, 32, 32)).unwrap();
        fs::write(dist.join("app.js"), b"console.log(1)").unwrap();
    }

    fn build(dist: &Path, cache_dir: &Path) -> (BatchReport, crate::cache::CacheStats) {
        let config = PluginConfig::parse(CONFIG).unwrap();
        let registry = CodecRegistry::builtin();
        let rules = config.rules(&registry).unwrap();
        let cache = TransformCache::new(DiskStore::new(cache_dir));
        let pipeline = Pipeline::new(registry, rules, Some(cache))
            .unwrap()
            .with_cache_conversions(config.cache.conversions);

        let assets = load_dir(dist).unwrap();
        let report = pipeline.run(&assets);
        write_report(dist, &report).unwrap();
        let stats = pipeline.cache().unwrap().stats();
        (report, stats)
    }

    #[test]
    fn test_dist_build_with_builtin_codecs() {
        let root = TempDir::new().unwrap();
        let cache_dir = root.path().join("cache");
        let first = root.path().join("dist");
        seed(&first);

        let (report, stats) = build(&first, &cache_dir);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(report.stats.converted, 1);
        assert_eq!(report.stats.compressed, 1);
        assert_eq!(stats.misses, 2);

        let webp = fs::read(first.join("img/logo.webp")).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert!(!first.join("img/logo.png").exists());
        let jpeg = fs::read(first.join("photo.jpg")).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
        assert_eq!(fs::read(first.join("app.js")).unwrap(), b"console.log(1)");

        // Same sources in a fresh output dir: everything comes from disk
        let second = root.path().join("dist2");
        seed(&second);
        let (report, stats) = build(&second, &cache_dir);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hits, 2);
        assert_eq!(report.stats.converted, 1);
        assert_eq!(fs::read(second.join("img/logo.webp")).unwrap(), webp);
        assert_eq!(fs::read(second.join("photo.jpg")).unwrap(), jpeg);
    }
}
