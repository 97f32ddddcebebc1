//! Output directory I/O.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pipeline::{Asset, AssetMutation, AssetSet, BatchReport};

/// Files that are never assets
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Read every file under `dir` into an asset set.
///
/// Asset names are relative to `dir` and `/`-separated.
pub fn load_dir(dir: &Path) -> Result<AssetSet> {
    let mut assets = AssetSet::new();

    for entry in WalkDir::new(dir).sort(true) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if IGNORED_FILES.contains(&name.as_ref()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content =
            fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        assets.emit(Asset::new(name, content));
    }

    crate::debug!("load"; "{} files from {}", assets.len(), dir.display());
    Ok(assets)
}

/// Files touched by [`write_report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub removed: usize,
}

/// Apply a batch's mutations to the files under `dir`.
///
/// Outputs of conversions are written before their source is removed, so an
/// interrupted run never loses an image.
pub fn write_report(dir: &Path, report: &BatchReport) -> Result<WriteStats> {
    let mut stats = WriteStats::default();

    for mutation in &report.mutations {
        let output = dir.join(mutation.output_name());
        write_atomic(&output, mutation.content())
            .with_context(|| format!("Failed to write {}", output.display()))?;
        stats.written += 1;

        if let AssetMutation::Replace { from, .. } = mutation {
            let source = dir.join(from);
            match fs::remove_file(&source) {
                Ok(()) => stats.removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", source.display()));
                }
            }
        }
    }

    Ok(stats)
}

/// Write through a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}-{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, content)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
