//! Errors raised while loading `imgshrink.toml` and turning it into rules.

use super::FieldPath;
use crate::utils::plural_count;
use owo_colors::OwoColorize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Rule normalization failed; carries every problem found.
    #[error("{0}")]
    Rules(ConfigDiagnostics),
}

impl ConfigError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One problem, addressed by its field path (`convert[0].to`).
#[derive(Debug, Clone)]
pub struct ConfigDiagnostic {
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {} {}", self.field.as_str().cyan().bold(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n    {} {hint}", "= hint:".dimmed())?;
        }
        Ok(())
    }
}

/// Collects problems across all rules so a broken config is reported at once.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    errors: Vec<ConfigDiagnostic>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field, message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: FieldPath, message: String, hint: Option<String>) {
        self.errors.push(ConfigDiagnostic {
            field,
            message,
            hint,
        });
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ConfigDiagnostic] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Rules(self))
        }
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            "invalid image rules".red().bold(),
            plural_count(self.errors.len(), "problem")
        )?;
        for diagnostic in &self.errors {
            write!(f, "\n{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_the_file() {
        let err = ConfigError::io(
            Path::new("imgshrink.toml"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(err.to_string(), "cannot read `imgshrink.toml`");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_diagnostics_list_every_problem() {
        let mut diag = ConfigDiagnostics::new();
        assert!(diag.is_empty());
        diag.error(FieldPath::new("convert").index(0).field("to"), "missing `to`");
        diag.error_with_hint(
            FieldPath::new("convert").index(1).field("conversion"),
            "nested table",
            "use `to`",
        );

        let Err(ConfigError::Rules(diag)) = diag.into_result() else {
            panic!("expected rule diagnostics");
        };
        let display = diag.to_string();
        assert!(display.contains("2 problems"));
        assert!(display.contains("convert[0].to"));
        assert!(display.contains("convert[1].conversion"));
        assert!(display.contains("use `to`"));
        assert_eq!(diag.errors()[1].hint.as_deref(), Some("use `to`"));
    }

    #[test]
    fn test_empty_diagnostics_pass() {
        assert!(ConfigDiagnostics::new().into_result().is_ok());
    }
}
