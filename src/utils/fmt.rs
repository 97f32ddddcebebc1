//! Human-readable sizes and counts.

/// Format a byte count for diagnostics.
///
/// - `format_file_size(512)` -> `"512 B"`
/// - `format_file_size(2048)` -> `"2.0 KB"`
/// - `format_file_size(3 * 1024 * 1024)` -> `"3.0 MB"`
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{bytes} B")
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / MB)
    }
}

/// Format count with noun, handling pluralization
///
/// - `plural_count(0, "file")` -> `"0 files"`
/// - `plural_count(1, "file")` -> `"1 file"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
