//! Error types for sitesmith.
//!
//! Library crates use [`SitesmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` and maps it to an exit code.

use std::path::PathBuf;

/// Top-level error type for all sitesmith operations.
#[derive(Debug, thiserror::Error)]
pub enum SitesmithError {
    /// Configuration loading or validation error, including a missing prompt template.
    #[error("config error: {message}")]
    Config { message: String },

    /// A stage's required upstream artifact does not exist in this run.
    #[error("config error: required artifact `{key}` not found (needed by {required_by})")]
    MissingArtifact { key: String, required_by: String },

    /// The text-generation service failed (transport, auth, or service error).
    #[error("generation error: {0}")]
    Generation(String),

    /// Network/HTTP error while fetching source data.
    #[error("network error: {0}")]
    Network(String),

    /// Feed or markup parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Content did not pass validation for its expected kind.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitesmithError>;

impl SitesmithError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Missing required upstream artifact.
    pub fn missing_artifact(key: impl Into<String>, required_by: impl Into<String>) -> Self {
        Self::MissingArtifact {
            key: key.into(),
            required_by: required_by.into(),
        }
    }

    /// Whether this error is fatal-by-configuration (stops the run).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::MissingArtifact { .. })
    }
}
