//! Terminal output: `log!`/`debug!` with colored `[module]` prefixes and a
//! single-line batch progress counter.
//!
//! Everything goes to stderr, so `imgshrink build --json` keeps stdout for the
//! report alone.
//!
//! ```ignore
//! log!("convert"; "{} -> {}", from, to);
//!
//! let progress = ProgressLine::new(&[("images", 42)]);
//! progress.inc("images");
//! progress.finish();
//! ```

use crossterm::{
    cursor, queue,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::io::{StderrLock, Write, stderr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set while a [`ProgressLine`] owns the last terminal line.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// macros
// ============================================================================

/// Log a message with a colored module prefix
///
/// ```ignore
/// log!("cache"; "cleared {}", dir.display());
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like [`log!`], but only with `--verbose`
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// output
// ============================================================================

pub fn log(module: &str, message: &str) {
    let mut out = stderr().lock();
    // A running progress line is redrawn by its next tick
    if PROGRESS_ACTIVE.load(Ordering::SeqCst) {
        clear_line(&mut out);
    }
    writeln!(out, "{} {message}", prefix(module)).ok();
    out.flush().ok();
}

fn clear_line(out: &mut StderrLock<'_>) {
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
}

/// `[module]`, colored by what the module reports on.
fn prefix(module: &str) -> String {
    let label = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "compress" | "compression" | "convert" | "conversion" => {
            label.bright_green().bold().to_string()
        }
        "cache" => label.bright_blue().bold().to_string(),
        "error" => label.bright_red().bold().to_string(),
        "warning" | "skip" => label.yellow().bold().to_string(),
        _ => label.bright_cyan().bold().to_string(),
    }
}

// ============================================================================
// progress
// ============================================================================

/// `[optimize] images(42/69)` redrawn in place as workers finish.
///
/// Workers never wait on the terminal: a tick that finds the display busy
/// only bumps its counter.
pub struct ProgressLine {
    counters: Vec<(&'static str, usize, AtomicUsize)>,
    display: Mutex<()>,
    finished: bool,
}

impl ProgressLine {
    /// Counters with a zero total are left out.
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|&(name, total)| (name, total, AtomicUsize::new(0)))
            .collect();

        PROGRESS_ACTIVE.store(true, Ordering::SeqCst);
        let progress = Self {
            counters,
            display: Mutex::new(()),
            finished: false,
        };
        progress.draw(false);
        progress
    }

    pub fn inc(&self, name: &str) {
        let Some((_, _, current)) = self.counters.iter().find(|(n, ..)| *n == name) else {
            return;
        };
        current.fetch_add(1, Ordering::Relaxed);
        if let Some(_guard) = self.display.try_lock() {
            self.draw(false);
        }
    }

    pub fn current(&self, name: &str) -> usize {
        self.counters
            .iter()
            .find(|(n, ..)| *n == name)
            .map_or(0, |(_, _, current)| current.load(Ordering::Relaxed))
    }

    fn render(&self) -> String {
        self.counters
            .iter()
            .map(|(name, total, current)| {
                format!("{name}({}/{total})", current.load(Ordering::Relaxed))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn draw(&self, newline: bool) {
        let mut out = stderr().lock();
        clear_line(&mut out);
        write!(out, "{} {}", prefix("optimize"), self.render()).ok();
        if newline {
            writeln!(out).ok();
        }
        out.flush().ok();
    }

    /// Leave the final counts on screen.
    pub fn finish(mut self) {
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        {
            let _guard = self.display.lock();
            self.draw(true);
        }
        self.finished = true;
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        // An unfinished line is wiped instead of left half-drawn
        if self.finished {
            return;
        }
        let mut out = stderr().lock();
        clear_line(&mut out);
        out.flush().ok();
    }
}
