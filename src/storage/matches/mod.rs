//! Ranked match persistence.
//!
//! A user's match set is replaced wholesale: readers observe either the previous
//! set or the new one, never a mix or an empty interval in between.

mod file;
mod locks;
mod memory;


pub use file::FileMatchStore;
pub use locks::UserLocks;
pub use memory::MemoryMatchStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::model::{MatchRecord, UserId, rank_order};
use crate::storage::error::{StorageError, StorageResult};

/// Read-path filter and pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchQuery {
    pub min_score: Option<f32>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl MatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a record with `overall_score` passes the score floor.
    #[inline]
    pub fn admits(&self, overall_score: f32) -> bool {
        self.min_score.is_none_or(|min| overall_score >= min)
    }

    /// Applies floor, offset and limit to records already in rank order.
    pub fn apply<I>(&self, ranked: I) -> Vec<MatchRecord>
    where
        I: IntoIterator<Item = MatchRecord>,
    {
        ranked
            .into_iter()
            .filter(|r| self.admits(r.overall_score))
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Storage contract for per-user ranked matches.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Atomically swaps the user's whole match set for `records`.
    ///
    /// Rejects records for another user or repeated job ids without touching the
    /// stored set. An empty `records` clears the user's matches.
    async fn replace_matches(&self, user_id: UserId, records: Vec<MatchRecord>)
    -> StorageResult<()>;

    /// Returns the user's matches by descending overall score.
    async fn get_matches(&self, user_id: UserId, query: MatchQuery)
    -> StorageResult<Vec<MatchRecord>>;
}

/// Validates a replacement set and puts it in rank order.
pub(crate) fn prepare_records(
    user_id: UserId,
    mut records: Vec<MatchRecord>,
) -> StorageResult<Vec<MatchRecord>> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if record.user_id != user_id {
            return Err(StorageError::UserMismatch {
                expected: user_id,
                found: record.user_id,
            });
        }
        if !seen.insert(record.job_id) {
            return Err(StorageError::DuplicateJob {
                user_id,
                job_id: record.job_id,
            });
        }
    }
    records.sort_by(rank_order);
    Ok(records)
}
