//! Error types for Sitetrail.
//!
//! Library crates use [`SitetrailError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Sitetrail operations.
#[derive(Debug, thiserror::Error)]
pub enum SitetrailError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error. A lost write always surfaces here.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad settings value, malformed stored row, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON encoding or decoding error at a wire boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitetrailError>;

impl SitetrailError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a storage error from any displayable message.
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SitetrailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SitetrailError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = SitetrailError::storage("database is opened in read-only mode");
        assert!(err.to_string().starts_with("storage error:"));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SitetrailError = bad.into();
        assert!(matches!(err, SitetrailError::Serialization(_)));
    }
}
