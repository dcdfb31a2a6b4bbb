//! Error types for loading configuration and conversations.
//!
//! Fitting itself never fails; these errors only come from the edges where
//! the crate reads files or validates user-supplied settings.

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `chatfit` I/O and configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
