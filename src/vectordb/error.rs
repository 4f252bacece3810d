use std::path::PathBuf;

use thiserror::Error;

use crate::constants::DimValidationError;
use crate::model::JobId;

#[derive(Debug, Error)]
/// Errors returned by the vector index.
pub enum VectorIndexError {
    /// Vector dimension mismatch.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Index dimension.
        expected: usize,
        /// Supplied dimension.
        actual: usize,
    },

    /// Vector contains NaN or infinity.
    #[error("vector for id {id} contains non-finite values")]
    NonFinite { id: JobId },

    /// The same id appeared twice in one batch.
    #[error("id {id} appears more than once in the batch")]
    DuplicateId { id: JobId },

    /// Snapshot and id mapping disagree or fail validation.
    #[error("index corrupted at {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// Snapshot was derived with a different encoder.
    #[error("index built with model '{found}', expected '{expected}'")]
    ModelMismatch { expected: String, found: String },

    #[error("invalid index configuration: {0}")]
    InvalidConfig(#[from] DimValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VectorIndexError {
    /// Whether the on-disk artifact must be rebuilt from source embeddings.
    pub fn is_corruption(&self) -> bool {
        matches!(self, VectorIndexError::Corrupted { .. })
    }
}

/// Convenience result type for index operations.
pub type VectorIndexResult<T> = Result<T, VectorIndexError>;
