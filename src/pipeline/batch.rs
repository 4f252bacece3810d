//! Recompute matches for many users over a bounded worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use super::error::{PipelineError, PipelineResult};
use super::orchestrator::MatchPipeline;
use crate::model::UserId;

/// Cooperative cancellation shared between a batch and whoever stops it.
///
/// Runs already in flight finish; users not yet started are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub enum UserOutcome {
    Completed { matches: usize },
    Failed(PipelineError),
    /// Not started because the batch was cancelled.
    Skipped,
}

/// Per-user outcomes, ascending by user id.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(UserId, UserOutcome)>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, UserOutcome::Completed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UserOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UserOutcome::Skipped))
    }

    fn count(&self, pred: impl Fn(&UserOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    pipeline: Arc<MatchPipeline>,
    workers: usize,
    cancel: CancellationFlag,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<MatchPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
            cancel: CancellationFlag::new(),
        }
    }

    /// Shares an existing flag, e.g. one wired to a signal handler.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Runs every user the profile provider knows about.
    pub async fn run_all(&self) -> PipelineResult<BatchReport> {
        let user_ids = self.pipeline.profiles().user_ids().await?;
        Ok(self.run(user_ids).await)
    }

    /// Failures are reported per user and never stop the rest of the batch.
    pub async fn run(&self, user_ids: Vec<UserId>) -> BatchReport {
        let total = user_ids.len();
        info!(users = total, workers = self.workers, "Starting batch run");

        let mut outcomes: Vec<(UserId, UserOutcome)> = stream::iter(user_ids)
            .map(|user_id| {
                let pipeline = Arc::clone(&self.pipeline);
                let cancel = self.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (user_id, UserOutcome::Skipped);
                    }
                    match pipeline.run_user(user_id).await {
                        Ok(outcome) => (
                            user_id,
                            UserOutcome::Completed {
                                matches: outcome.records.len(),
                            },
                        ),
                        Err(error) => {
                            warn!(user_id, error = %error, "Match run failed");
                            (user_id, UserOutcome::Failed(error))
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        outcomes.sort_by_key(|(user_id, _)| *user_id);

        let report = BatchReport { outcomes };
        info!(
            users = total,
            completed = report.completed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Batch run finished"
        );
        report
    }
}
