use std::path::{Path, PathBuf};

use crate::embedding::error::EmbeddingError;

/// Default MiniLM output width.
pub const MINILM_EMBEDDING_DIM: usize = crate::constants::DEFAULT_EMBEDDING_DIM;

/// Default MiniLM token budget.
pub const MINILM_MAX_SEQ_LEN: usize = crate::constants::DEFAULT_MAX_SEQ_LEN;

/// Texts per forward pass.
pub const MINILM_BATCH_SIZE: usize = 32;

const STUB_MODEL_VERSION: &str = "stub-v1";

#[derive(Debug, Clone)]
/// Configuration for [`MiniLmEncoder`](super::MiniLmEncoder).
pub struct MiniLmConfig {
    /// Directory holding `config.json`, `model.safetensors` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Max tokens to consider per text.
    pub max_seq_len: usize,
    /// Expected output dimension (must equal the model hidden size).
    pub embedding_dim: usize,
    /// Texts per forward pass.
    pub batch_size: usize,
    /// Try Metal/CUDA before CPU.
    pub prefer_gpu: bool,
    /// If true, run in deterministic stub mode (no model files required).
    pub testing_stub: bool,
}

impl Default for MiniLmConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::new(),
            max_seq_len: MINILM_MAX_SEQ_LEN,
            embedding_dim: MINILM_EMBEDDING_DIM,
            batch_size: MINILM_BATCH_SIZE,
            prefer_gpu: false,
            testing_stub: false,
        }
    }
}

impl MiniLmConfig {
    /// Creates a config for a model directory.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Default::default()
        }
    }

    /// Creates a stub config (no model files; deterministic embeddings).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.model_dir.join("config.json")
    }

    pub fn weights_path(&self) -> PathBuf {
        self.model_dir.join("model.safetensors")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join("tokenizer.json")
    }

    /// Version string persisted alongside derived vectors.
    pub fn model_version(&self) -> String {
        if self.testing_stub {
            return format!("{STUB_MODEL_VERSION}/{}", self.embedding_dim);
        }
        let name = self
            .model_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("minilm");
        format!("{name}/{}/{}", self.embedding_dim, self.max_seq_len)
    }

    /// Validates sizes and, outside stub mode, the presence of model files.
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be positive".to_string(),
            });
        }
        if self.batch_size == 0 || self.max_seq_len == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "batch_size and max_seq_len must be positive".to_string(),
            });
        }

        if self.testing_stub {
            return Ok(());
        }

        if self.model_dir.as_os_str().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "model_dir is required (stubbing is disabled)".to_string(),
            });
        }

        for path in [self.config_path(), self.weights_path(), self.tokenizer_path()] {
            if !path.exists() {
                return Err(EmbeddingError::ModelNotFound { path });
            }
        }

        Ok(())
    }

    /// Returns `true` if all model files exist.
    pub fn model_available(&self) -> bool {
        !self.model_dir.as_os_str().is_empty()
            && [self.config_path(), self.weights_path(), self.tokenizer_path()]
                .iter()
                .all(|p| Path::exists(p))
    }
}
