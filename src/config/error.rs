//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable is set but cannot be used.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnvValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A weight is negative or not a finite number.
    #[error("weight '{key}' must be a finite, non-negative number (got {value})")]
    InvalidWeight { key: &'static str, value: f32 },

    #[error("minimum_match_score must be within [0, 1] (got {value})")]
    InvalidThreshold { value: f32 },

    /// Malformed document, unknown key, or inconsistent sizes.
    #[error("invalid matching configuration: {reason}")]
    InvalidMatchingConfig { reason: String },
}
