use thiserror::Error;

use crate::config::ConfigError;
use crate::embedding::EmbeddingError;
use crate::model::UserId;
use crate::provider::ProviderError;
use crate::storage::StorageError;

/// Fatal outcomes of a single ranking run. Nothing is persisted when one occurs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no profile for user {user_id}")]
    ProfileNotFound { user_id: UserId },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The profile could not be embedded; the run aborts before scoring.
    #[error("failed to encode profile for user {user_id}: {source}")]
    ProfileEncoding {
        user_id: UserId,
        #[source]
        source: EmbeddingError,
    },

    #[error("failed to persist matches after {attempts} attempt(s): {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("invalid pipeline configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline is missing its {0}")]
    MissingComponent(&'static str),

    #[error("encoder produces {encoder}-d vectors but the index stores {index}-d")]
    DimensionMismatch { encoder: usize, index: usize },

    #[error("background task failed: {0}")]
    Task(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
