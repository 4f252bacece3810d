//! Caches for derived data.

pub mod embeddings;

pub use embeddings::{EmbeddingCache, EmbeddingKey};
