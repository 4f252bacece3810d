//! Per-user ranking pipeline.
//!
//! [`MatchPipeline::run_user`] pulls the profile and active jobs, reuses or
//! computes embeddings, shortlists by vector similarity, scores the shortlist
//! and atomically replaces the user's stored matches. When the vector index is
//! missing or unusable the run scores every active job instead.
//!
//! [`BatchRunner`] fans runs out over many users with a worker limit and
//! cooperative cancellation.

pub mod batch;
pub mod error;
pub mod orchestrator;
pub mod retry;

#[cfg(test)]
mod tests;

pub use batch::{BatchReport, BatchRunner, CancellationFlag, UserOutcome};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{
    MatchPipeline, MatchPipelineBuilder, PipelineConfig, PipelineOutcome, RunStats,
};
pub use retry::{RetryExhausted, RetryPolicy};
