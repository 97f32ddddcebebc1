//! Small formatting helpers shared by the pipeline and the CLI.

mod fmt;

pub use fmt::{format_file_size, plural_count};
