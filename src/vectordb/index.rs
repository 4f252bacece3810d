//! Flat inner-product index with a binary-code prefilter.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use super::bq::{nearest_codes, quantize_to_binary};
use super::error::{VectorIndexError, VectorIndexResult};
use super::snapshot::{read_snapshot, write_snapshot};
use crate::constants::{DEFAULT_EMBEDDING_DIM, validate_index_dim};
use crate::embedding::{EmbeddingVector, dot};
use crate::model::JobId;

/// Above this many entries, search narrows with binary codes before exact scoring.
pub const DEFAULT_EXACT_SEARCH_LIMIT: usize = 4096;

/// Prefilter keeps `k * multiplier` candidates for exact rescoring.
pub const DEFAULT_RESCORE_MULTIPLIER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Index tuning.
pub struct IndexConfig {
    pub dim: usize,
    pub exact_search_limit: usize,
    pub rescore_multiplier: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_EMBEDDING_DIM,
            exact_search_limit: DEFAULT_EXACT_SEARCH_LIMIT,
            rescore_multiplier: DEFAULT_RESCORE_MULTIPLIER,
        }
    }
}

impl IndexConfig {
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> VectorIndexResult<()> {
        validate_index_dim(self.dim)?;
        Ok(())
    }
}

/// One vector to insert, tagged with the content hash it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: JobId,
    pub content_hash: u64,
    pub vector: EmbeddingVector,
}

impl IndexEntry {
    pub fn new(id: JobId, content_hash: u64, vector: EmbeddingVector) -> Self {
        Self {
            id,
            content_hash,
            vector,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// One search result.
pub struct SearchHit {
    pub id: JobId,
    /// Inner product with the query (cosine for unit vectors), in `[-1, 1]`.
    pub score: f32,
}

/// Similarity search over stored job vectors.
///
/// Writers are serialized; a search observes the index either entirely before
/// or entirely after any write.
pub trait SimilarityIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or replaces one vector. A replaced id keeps its insertion position.
    fn insert(&self, id: JobId, vector: &EmbeddingVector, content_hash: u64)
    -> VectorIndexResult<()>;

    /// Inserts many vectors as one write; nothing is applied if any entry is invalid.
    fn insert_batch(&self, entries: &[IndexEntry]) -> VectorIndexResult<()>;

    /// Top `k` ids by descending inner product, ties by insertion order.
    fn search(&self, query: &EmbeddingVector, k: usize) -> VectorIndexResult<Vec<SearchHit>>;

    /// Stored `(content_hash, vector)` for `id`.
    fn lookup(&self, id: JobId) -> Option<(u64, EmbeddingVector)>;

    fn contains(&self, id: JobId) -> bool {
        self.lookup(id).is_some()
    }

    /// Drops every id not in `keep` as one write. Returns how many were removed.
    fn retain(&self, keep: &HashSet<JobId>) -> VectorIndexResult<usize>;
}

#[derive(Debug, Clone, Default)]
struct IndexState {
    ids: Vec<JobId>,
    tags: Vec<u64>,
    vectors: Vec<f32>,
    codes: Vec<u8>,
    positions: HashMap<JobId, usize>,
}

impl IndexState {
    fn from_parts(dim: usize, ids: Vec<JobId>, tags: Vec<u64>, vectors: Vec<f32>) -> Self {
        let codes = vectors.chunks_exact(dim).flat_map(quantize_to_binary).collect();
        let positions = ids.iter().enumerate().map(|(pos, id)| (*id, pos)).collect();
        Self {
            ids,
            tags,
            vectors,
            codes,
            positions,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn row(&self, dim: usize, pos: usize) -> &[f32] {
        &self.vectors[pos * dim..(pos + 1) * dim]
    }

    fn upsert(&mut self, dim: usize, entry: &IndexEntry) {
        let values = entry.vector.as_slice();
        let code = quantize_to_binary(values);
        let code_len = code.len();
        match self.positions.get(&entry.id) {
            Some(&pos) => {
                self.tags[pos] = entry.content_hash;
                self.vectors[pos * dim..(pos + 1) * dim].copy_from_slice(values);
                self.codes[pos * code_len..(pos + 1) * code_len].copy_from_slice(&code);
            }
            None => {
                self.positions.insert(entry.id, self.ids.len());
                self.ids.push(entry.id);
                self.tags.push(entry.content_hash);
                self.vectors.extend_from_slice(values);
                self.codes.extend_from_slice(&code);
            }
        }
    }
}

/// In-memory flat index, optionally backed by a snapshot file.
///
/// Every write builds the next state off to the side, persists it (when backed
/// by a file) and only then publishes it. A failed write leaves both memory and
/// disk on the previous state.
pub struct VectorIndex {
    config: IndexConfig,
    model_version: String,
    path: Option<PathBuf>,
    state: RwLock<Arc<IndexState>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dim", &self.config.dim)
            .field("len", &self.len())
            .field("model_version", &self.model_version)
            .field("path", &self.path)
            .finish()
    }
}

impl VectorIndex {
    /// Creates an empty, memory-only index.
    pub fn in_memory(config: IndexConfig, model_version: impl Into<String>) -> VectorIndexResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model_version: model_version.into(),
            path: None,
            state: RwLock::new(Arc::new(IndexState::default())),
            writer: Mutex::new(()),
        })
    }

    /// Opens the snapshot at `path`, or starts empty if none exists yet.
    ///
    /// Returns [`VectorIndexError::Corrupted`] if the artifact fails validation and
    /// [`VectorIndexError::ModelMismatch`] if it was built by another encoder.
    pub fn open(
        path: impl Into<PathBuf>,
        config: IndexConfig,
        model_version: impl Into<String>,
    ) -> VectorIndexResult<Self> {
        config.validate()?;
        let path = path.into();
        let model_version = model_version.into();

        let state = if path.exists() {
            let data = read_snapshot(&path, config.dim)?;
            if data.model_version != model_version {
                return Err(VectorIndexError::ModelMismatch {
                    expected: model_version,
                    found: data.model_version,
                });
            }
            info!(path = %path.display(), entries = data.ids.len(), "Vector index loaded");
            IndexState::from_parts(config.dim, data.ids, data.tags, data.vectors)
        } else {
            debug!(path = %path.display(), "No index snapshot, starting empty");
            IndexState::default()
        };

        Ok(Self {
            config,
            model_version,
            path: Some(path),
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    /// Starts an empty index backed by `path` without reading it.
    ///
    /// Any existing artifact is replaced on the first write. Used to recover from
    /// a corrupted or stale snapshot via [`rebuild`](Self::rebuild).
    pub fn create(
        path: impl Into<PathBuf>,
        config: IndexConfig,
        model_version: impl Into<String>,
    ) -> VectorIndexResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model_version: model_version.into(),
            path: Some(path.into()),
            state: RwLock::new(Arc::new(IndexState::default())),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<JobId> {
        self.current().ids.clone()
    }

    /// Replaces the whole contents with `entries` (in order) as one write.
    pub fn rebuild(&self, entries: &[IndexEntry]) -> VectorIndexResult<()> {
        self.validate_entries(entries)?;
        let _writer = self.writer.lock();
        let mut next = IndexState::default();
        for entry in entries {
            next.upsert(self.config.dim, entry);
        }
        self.publish(next)?;
        info!(entries = entries.len(), "Vector index rebuilt");
        Ok(())
    }

    fn current(&self) -> Arc<IndexState> {
        Arc::clone(&self.state.read())
    }

    fn validate_entries(&self, entries: &[IndexEntry]) -> VectorIndexResult<()> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if entry.vector.dim() != self.config.dim {
                return Err(VectorIndexError::InvalidDimension {
                    expected: self.config.dim,
                    actual: entry.vector.dim(),
                });
            }
            if entry.vector.as_slice().iter().any(|v| !v.is_finite()) {
                return Err(VectorIndexError::NonFinite { id: entry.id });
            }
            if !seen.insert(entry.id) {
                return Err(VectorIndexError::DuplicateId { id: entry.id });
            }
        }
        Ok(())
    }

    /// Persists `next` (if file-backed) and swaps it in. Caller holds the writer lock.
    fn publish(&self, next: IndexState) -> VectorIndexResult<()> {
        if let Some(path) = &self.path {
            write_snapshot(
                path,
                self.config.dim,
                &self.model_version,
                &next.ids,
                &next.tags,
                &next.vectors,
            )?;
        }
        *self.state.write() = Arc::new(next);
        Ok(())
    }
}

impl SimilarityIndex for VectorIndex {
    fn dimension(&self) -> usize {
        self.config.dim
    }

    fn len(&self) -> usize {
        self.state.read().len()
    }

    fn insert(
        &self,
        id: JobId,
        vector: &EmbeddingVector,
        content_hash: u64,
    ) -> VectorIndexResult<()> {
        self.insert_batch(&[IndexEntry::new(id, content_hash, vector.clone())])
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    fn insert_batch(&self, entries: &[IndexEntry]) -> VectorIndexResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.validate_entries(entries)?;

        let _writer = self.writer.lock();
        let mut next = IndexState::clone(&self.current());
        for entry in entries {
            next.upsert(self.config.dim, entry);
        }
        self.publish(next)?;
        debug!(len = self.len(), "Vector index updated");
        Ok(())
    }

    fn search(&self, query: &EmbeddingVector, k: usize) -> VectorIndexResult<Vec<SearchHit>> {
        let dim = self.config.dim;
        if query.dim() != dim {
            return Err(VectorIndexError::InvalidDimension {
                expected: dim,
                actual: query.dim(),
            });
        }

        let state = self.current();
        if k == 0 || state.len() == 0 {
            return Ok(Vec::new());
        }

        let budget = k.saturating_mul(self.config.rescore_multiplier).max(k);
        let candidates: Vec<usize> =
            if state.len() > self.config.exact_search_limit && budget < state.len() {
                let query_code = quantize_to_binary(query.as_slice());
                nearest_codes(&state.codes, query_code.len(), &query_code, budget)
            } else {
                (0..state.len()).collect()
            };

        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|pos| (pos, dot(state.row(dim, pos), query.as_slice())))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| SearchHit {
                id: state.ids[pos],
                score,
            })
            .collect())
    }

    fn lookup(&self, id: JobId) -> Option<(u64, EmbeddingVector)> {
        let state = self.current();
        let pos = *state.positions.get(&id)?;
        Some((
            state.tags[pos],
            EmbeddingVector::from_normalized(state.row(self.config.dim, pos).to_vec()),
        ))
    }

    fn contains(&self, id: JobId) -> bool {
        self.state.read().positions.contains_key(&id)
    }

    fn retain(&self, keep: &HashSet<JobId>) -> VectorIndexResult<usize> {
        let dim = self.config.dim;
        let _writer = self.writer.lock();
        let current = self.current();
        let kept: Vec<usize> = (0..current.len())
            .filter(|&pos| keep.contains(&current.ids[pos]))
            .collect();
        let removed = current.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let ids = kept.iter().map(|&pos| current.ids[pos]).collect();
        let tags = kept.iter().map(|&pos| current.tags[pos]).collect();
        let vectors = kept
            .iter()
            .flat_map(|&pos| current.row(dim, pos).iter().copied())
            .collect();
        self.publish(IndexState::from_parts(dim, ids, tags, vectors))?;
        debug!(removed, len = self.len(), "Vector index pruned");
        Ok(removed)
    }
}
