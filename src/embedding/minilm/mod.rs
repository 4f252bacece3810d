//! MiniLM sentence encoder (BERT + mean pooling).
//!
//! Use [`MiniLmConfig::stub`] for tests and deployments without model files.

/// MiniLM configuration.
pub mod config;


pub use config::{MINILM_BATCH_SIZE, MINILM_EMBEDDING_DIM, MINILM_MAX_SEQ_LEN, MiniLmConfig};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::constants::validate_embedding_dim;
use crate::embedding::device::select_device;
use crate::embedding::encoder::{EmbeddingVector, TextEncoder, is_blank, seeded_embedding};
use crate::embedding::error::EmbeddingError;
use crate::embedding::utils::load_batch_tokenizer;

enum EncoderBackend {
    Model {
        model: BertModel,
        tokenizer: Tokenizer,
        device: Device,
    },
    Stub,
}

/// Sentence encoder producing L2-normalized, mean-pooled BERT embeddings.
pub struct MiniLmEncoder {
    backend: EncoderBackend,
    config: MiniLmConfig,
    model_version: String,
}

impl std::fmt::Debug for MiniLmEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniLmEncoder")
            .field(
                "backend",
                &match &self.backend {
                    EncoderBackend::Model { device, .. } => format!("Model({:?})", device),
                    EncoderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.config.embedding_dim)
            .field("model_version", &self.model_version)
            .finish()
    }
}

impl MiniLmEncoder {
    /// Loads the encoder (stub mode is supported).
    pub fn load(config: MiniLmConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        let model_version = config.model_version();

        if config.testing_stub {
            warn!("MiniLM encoder running in STUB mode");
            return Ok(Self {
                backend: EncoderBackend::Stub,
                config,
                model_version,
            });
        }

        let device = select_device(config.prefer_gpu)?;
        debug!(?device, "Selected compute device for MiniLM");

        let (model, tokenizer) = Self::load_model(&config, &device)?;

        info!(
            model_dir = %config.model_dir.display(),
            embedding_dim = config.embedding_dim,
            max_seq_len = config.max_seq_len,
            %model_version,
            "MiniLM encoder loaded"
        );

        Ok(Self {
            backend: EncoderBackend::Model {
                model,
                tokenizer,
                device,
            },
            config,
            model_version,
        })
    }

    fn load_model(
        config: &MiniLmConfig,
        device: &Device,
    ) -> Result<(BertModel, Tokenizer), EmbeddingError> {
        let tokenizer = load_batch_tokenizer(&config.tokenizer_path(), config.max_seq_len)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            })?;

        let config_content = std::fs::read_to_string(config.config_path())?;
        let bert_config: BertConfig =
            serde_json::from_str(&config_content).map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to parse config.json: {}", e),
            })?;

        validate_embedding_dim(bert_config.hidden_size, config.embedding_dim).map_err(|_| {
            EmbeddingError::DimensionMismatch {
                expected: config.embedding_dim,
                actual: bert_config.hidden_size,
            }
        })?;

        // SAFETY: the weights file is opened read-only and not mutated while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[config.weights_path()], DType::F32, device)?
        };

        let model = BertModel::load(vb, &bert_config).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to load BERT weights: {}", e),
            }
        })?;

        Ok((model, tokenizer))
    }

    /// Returns `true` if running in stub mode.
    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EncoderBackend::Stub)
    }

    /// Returns the encoder configuration.
    pub fn config(&self) -> &MiniLmConfig {
        &self.config
    }

    fn encode_non_blank(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        match &self.backend {
            EncoderBackend::Stub => Ok(texts
                .iter()
                .map(|text| seeded_embedding(text, self.config.embedding_dim))
                .collect()),
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => {
                let mut out = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(self.config.batch_size) {
                    out.extend(self.forward_chunk(chunk, model, tokenizer, device)?);
                }
                Ok(out)
            }
        }
    }

    fn forward_chunk(
        &self,
        texts: &[&str],
        model: &BertModel,
        tokenizer: &Tokenizer,
        device: &Device,
    ) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let encodings = tokenizer.encode_batch(texts.to_vec(), true)?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), device)?);
        }

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        debug!(
            batch = texts.len(),
            seq_len = input_ids.dim(1)?,
            "MiniLM forward pass"
        );

        // [batch, seq, hidden]
        let hidden = model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean over real tokens only: pad positions have mask 0.
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1.0f32, f32::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let rows = pooled.to_vec2::<f32>()?;
        rows.into_iter()
            .map(|row| {
                if row.len() != self.config.embedding_dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.embedding_dim,
                        actual: row.len(),
                    });
                }
                Ok(EmbeddingVector::from_raw(row))
            })
            .collect()
    }
}

impl TextEncoder for MiniLmEncoder {
    fn encode(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        if is_blank(text) {
            return Ok(EmbeddingVector::sentinel(self.config.embedding_dim));
        }
        let mut out = self.encode_non_blank(&[text])?;
        out.pop().ok_or_else(|| EmbeddingError::InferenceFailed {
            reason: "encoder returned no rows".to_string(),
        })
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (positions, non_blank): (Vec<usize>, Vec<&str>) = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !is_blank(text))
            .map(|(i, text)| (i, *text))
            .unzip();

        let encoded = self.encode_non_blank(&non_blank)?;

        let mut out = vec![EmbeddingVector::sentinel(self.config.embedding_dim); texts.len()];
        for (position, vector) in positions.into_iter().zip(encoded) {
            out[position] = vector;
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
