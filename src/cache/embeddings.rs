//! Embedding cache (in-memory).
//!
//! Keys are entity ids; every entry remembers the content hash it was derived
//! from. A lookup with a different hash evicts the entry and misses, so a profile
//! edit or a job rewrite always triggers a fresh encode.

use moka::sync::Cache;

use crate::embedding::EmbeddingVector;
use crate::model::{JobId, UserId};

/// Owner of a cached embedding. Vectors are never shared across entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingKey {
    Profile(UserId),
    Job(JobId),
}

#[derive(Debug, Clone)]
struct CachedEmbedding {
    content_hash: u64,
    vector: EmbeddingVector,
}

/// Bounded cache of derived embeddings (TinyLFU eviction).
#[derive(Clone)]
pub struct EmbeddingCache {
    entries: Cache<EmbeddingKey, CachedEmbedding>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl EmbeddingCache {
    pub const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a cache with the default capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` vectors.
    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Returns the vector for `key` if it was derived from `content_hash`.
    pub fn get(&self, key: EmbeddingKey, content_hash: u64) -> Option<EmbeddingVector> {
        let cached = self.entries.get(&key)?;
        if cached.content_hash == content_hash {
            Some(cached.vector)
        } else {
            self.entries.invalidate(&key);
            None
        }
    }

    #[inline]
    pub fn insert(&self, key: EmbeddingKey, content_hash: u64, vector: EmbeddingVector) {
        self.entries.insert(
            key,
            CachedEmbedding {
                content_hash,
                vector,
            },
        );
    }

    #[inline]
    pub fn invalidate(&self, key: EmbeddingKey) {
        self.entries.invalidate(&key);
    }

    /// Approximate number of cached vectors.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes moka's pending maintenance so [`len`](Self::len) is exact.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}
