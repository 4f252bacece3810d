//! Text encoders.
//!
//! - [`encoder`] defines the [`TextEncoder`] contract and [`EmbeddingVector`].
//! - [`minilm`] is the production encoder (candle BERT, mean pooling).

/// Device selection (CPU / Metal / CUDA).
pub mod device;
/// Encoder trait and vector type.
pub mod encoder;
mod error;
/// MiniLM sentence encoder.
pub mod minilm;
#[cfg(any(test, feature = "mock"))]
mod mock;
/// Tokenizer loading helpers.
pub mod utils;

pub use encoder::{EmbeddingVector, NORM_TOLERANCE, TextEncoder, dot, l2_normalize};
pub use error::EmbeddingError;
pub use minilm::{MINILM_EMBEDDING_DIM, MiniLmConfig, MiniLmEncoder};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEncoder;
