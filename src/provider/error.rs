use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backing store could not be reached.
    #[error("provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

pub type ProviderResult<T> = Result<T, ProviderError>;
