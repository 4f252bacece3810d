//! Jobrank library crate (used by the CLI binary and integration tests).
//!
//! Ranks job postings for a candidate by combining embedding similarity with
//! deterministic attribute scoring, and persists one ranked list per user.
//!
//! # Modules
//!
//! - [`embedding`]: [`TextEncoder`] contract, MiniLM encoder, stub mode
//! - [`vectordb`]: file-backed [`VectorIndex`] with a binary-code prefilter
//! - [`scoring`]: pure [`Scorer`] producing six sub-scores and an overall score
//! - [`storage`]: [`MatchRepository`] with atomic per-user replacement
//! - [`pipeline`]: [`MatchPipeline`] orchestration and [`BatchRunner`]
//! - [`provider`]: read-side contracts for profiles and postings
//! - [`config`]: environment settings and the JSON [`MatchingConfig`]
//!
//! ## Test/Mock Support
//! [`MockEncoder`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod hashing;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod scoring;
pub mod storage;
pub mod vectordb;

pub use cache::{EmbeddingCache, EmbeddingKey};
pub use config::{Config, ConfigError, MatchingConfig, Thresholds, WeightConfig};
pub use constants::{DimValidationError, validate_embedding_dim};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEncoder;
pub use embedding::{
    EmbeddingError, EmbeddingVector, MINILM_EMBEDDING_DIM, MiniLmConfig, MiniLmEncoder,
    TextEncoder,
};
pub use hashing::{hash_text, hash_to_u64};
pub use model::{
    CompanySize, EmployerSummary, ExperienceLevel, JobId, JobPosting, MatchRecord, Profile,
    RemotePolicy, RemotePreference, SalaryRange, UserId,
};
pub use pipeline::{
    BatchReport, BatchRunner, CancellationFlag, MatchPipeline, PipelineConfig, PipelineError,
    PipelineOutcome, RetryPolicy, RunStats, UserOutcome,
};
pub use provider::{Catalog, JobProvider, ProfileProvider, ProviderError};
pub use scoring::{ScoreBreakdown, Scorer, ScoringError, SubScores};
pub use storage::{
    FileMatchStore, MatchQuery, MatchRepository, MemoryMatchStore, StorageError, StorageResult,
};
pub use vectordb::{
    IndexConfig, IndexEntry, SearchHit, SimilarityIndex, VectorIndex, VectorIndexError,
};
