//! Encoder contract and the vector type it produces.

use std::sync::Arc;

use super::error::EmbeddingError;
use crate::hashing::hash_text;

/// Tolerance used when checking that a vector is unit length.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Fixed-length, L2-normalized embedding.
///
/// The all-zero vector is the sentinel for empty input: its inner product with
/// anything is 0, so it never wins a similarity ranking. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Normalizes `values` to unit length. A zero vector stays zero.
    pub fn from_raw(mut values: Vec<f32>) -> Self {
        l2_normalize(&mut values);
        Self {
            values: values.into(),
        }
    }

    /// Wraps values that are already unit length (or the zero sentinel).
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// The empty-input sentinel.
    pub fn sentinel(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim].into(),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn is_sentinel(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Inner product; equals cosine similarity for unit vectors.
    pub fn dot(&self, other: &EmbeddingVector) -> f32 {
        dot(&self.values, &other.values)
    }
}

/// Inner product over the shared prefix of two slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scales `values` to unit length in place. Zero and non-finite norms are left alone.
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in values.iter_mut() {
            *x /= norm;
        }
    }
}

/// Whether `text` should map to the sentinel.
#[inline]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Deterministic pseudo-embedding seeded from the text hash.
///
/// Used by stub encoders so tests and model-less deployments still produce
/// stable, distinct unit vectors.
pub fn seeded_embedding(text: &str, dim: usize) -> EmbeddingVector {
    let mut state = hash_text(text);
    let mut values = Vec::with_capacity(dim);
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        values.push(value);
    }
    EmbeddingVector::from_raw(values)
}

/// Converts text to fixed-dimension unit vectors.
///
/// Output is deterministic for a fixed [`model_version`](TextEncoder::model_version).
/// Blank input yields [`EmbeddingVector::sentinel`] rather than an error.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError>;

    /// Encodes many texts; results are in input order. Fails as a whole if any item fails.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        texts.iter().map(|text| self.encode(text)).collect()
    }

    fn dimension(&self) -> usize;

    /// Identifier persisted next to derived vectors so a model swap invalidates them.
    fn model_version(&self) -> &str;
}
