//! Command-line interface module.

mod args;
pub mod build;

pub use args::{BuildArgs, Cli, Commands, Mode};
