//! Error types for lipidsort.
//!
//! Library crates use [`LipidSortError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all lipidsort operations.
#[derive(Debug, thiserror::Error)]
pub enum LipidSortError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to LipidMaps.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input file (CSV, sink, JSON payload).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty input, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The classification oracle could not be reached or returned an unusable
    /// transport response. Fatal to the run.
    #[error("oracle error: {0}")]
    Oracle(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LipidSortError>;

impl LipidSortError {
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

    /// Create an oracle transport error.
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
