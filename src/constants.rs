//! Cross-cutting, shared constants.
//!
//! The embedding dimension is a compile-time default shared by the encoder, the
//! vector index and its snapshot format. Indexes built with another encoder
//! carry their own dimension and are checked with [`validate_embedding_dim`].

use thiserror::Error;

/// MiniLM-L6 sentence encoder output width.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Token budget for a single encoder pass.
pub const DEFAULT_MAX_SEQ_LEN: usize = 256;

/// Candidates pulled from the index before full scoring.
pub const DEFAULT_SHORTLIST_SIZE: usize = 500;

/// Matches persisted per user.
pub const DEFAULT_TOP_K: usize = 50;

pub const DEFAULT_MINIMUM_MATCH_SCORE: f32 = 0.6;

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimValidationError {
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,

    #[error("embedding dimension {dim} is not divisible by 8 (required for binary codes)")]
    NotDivisibleBy8 { dim: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Checks that `dim` can back a vector index (non-zero, byte-aligned binary codes).
pub fn validate_index_dim(dim: usize) -> Result<(), DimValidationError> {
    if dim == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if !dim.is_multiple_of(8) {
        return Err(DimValidationError::NotDivisibleBy8 { dim });
    }
    Ok(())
}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// ```
/// use jobrank::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// validate_embedding_dim(384, DEFAULT_EMBEDDING_DIM).unwrap();
/// assert!(validate_embedding_dim(768, DEFAULT_EMBEDDING_DIM).is_err());
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
