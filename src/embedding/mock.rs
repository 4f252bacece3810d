//! Deterministic encoder double.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::encoder::{EmbeddingVector, TextEncoder, is_blank, seeded_embedding};
use super::error::EmbeddingError;

/// In-memory [`TextEncoder`] with scripted vectors and failures.
///
/// Unscripted texts get a hash-seeded unit vector, so results stay stable
/// across runs. Every non-blank text that reaches the encoder is counted.
#[derive(Debug)]
pub struct MockEncoder {
    dim: usize,
    fixed: HashMap<String, EmbeddingVector>,
    failing: HashSet<String>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl MockEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            fixed: HashMap::new(),
            failing: HashSet::new(),
            unavailable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns `values` (normalized) for exactly `text`.
    pub fn with_vector(mut self, text: impl Into<String>, values: Vec<f32>) -> Self {
        self.fixed
            .insert(text.into(), EmbeddingVector::from_raw(values));
        self
    }

    /// Fails with [`EmbeddingError::InferenceFailed`] for exactly `text`.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Makes every call fail with [`EmbeddingError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Number of non-blank texts encoded so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

impl TextEncoder for MockEncoder {
    fn encode(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(EmbeddingError::Unavailable {
                reason: "mock encoder marked unavailable".to_string(),
            });
        }
        if is_blank(text) {
            return Ok(EmbeddingVector::sentinel(self.dim));
        }
        self.calls.fetch_add(1, Ordering::AcqRel);
        if self.failing.contains(text) {
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("scripted failure for {text:?}"),
            });
        }
        Ok(self
            .fixed
            .get(text)
            .cloned()
            .unwrap_or_else(|| seeded_embedding(text, self.dim)))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_version(&self) -> &str {
        "mock-v1"
    }
}
