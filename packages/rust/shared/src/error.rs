//! Error types for docweave.
//!
//! Library crates use [`DocweaveError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docweave operations.
#[derive(Debug, thiserror::Error)]
pub enum DocweaveError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Markup or text-stream parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A source document required by the ingestion run does not exist.
    #[error("missing source document for language '{lang}': {path:?}")]
    MissingSource { lang: String, path: PathBuf },

    /// A localized artifact could not be loaded; the feature is unavailable.
    #[error("{artifact} unavailable for language '{lang}'")]
    Unavailable { lang: String, artifact: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocweaveError>;

impl DocweaveError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Mark a per-language artifact as unavailable.
    pub fn unavailable(lang: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::Unavailable {
            lang: lang.into(),
            artifact: artifact.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only degrades a feature rather than failing an operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocweaveError::config("bad regex");
        assert_eq!(err.to_string(), "config error: bad regex");

        let err = DocweaveError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));
    }

    #[test]
    fn unavailable_is_distinguishable() {
        let err = DocweaveError::unavailable("ko", "search index");
        assert!(err.is_unavailable());
        assert_eq!(err.to_string(), "search index unavailable for language 'ko'");

        let err = DocweaveError::MissingSource {
            lang: "en".into(),
            path: PathBuf::from("manual.html"),
        };
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("manual.html"));
    }
}
