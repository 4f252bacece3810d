use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{MatchQuery, MatchRepository, prepare_records};
use crate::model::{MatchRecord, UserId};
use crate::storage::error::StorageResult;

/// In-process match repository.
///
/// Each user's set lives behind an `Arc`; a replacement builds the new set off
/// to the side and swaps the pointer under the write lock.
#[derive(Debug, Default)]
pub struct MemoryMatchStore {
    sets: RwLock<HashMap<UserId, Arc<Vec<MatchRecord>>>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored set (empty sets included).
    pub fn user_count(&self) -> usize {
        self.sets.read().len()
    }

    /// Current snapshot for a user, unfiltered.
    pub fn snapshot(&self, user_id: UserId) -> Option<Arc<Vec<MatchRecord>>> {
        self.sets.read().get(&user_id).cloned()
    }
}

#[async_trait]
impl MatchRepository for MemoryMatchStore {
    async fn replace_matches(
        &self,
        user_id: UserId,
        records: Vec<MatchRecord>,
    ) -> StorageResult<()> {
        let records = prepare_records(user_id, records)?;
        let count = records.len();
        self.sets.write().insert(user_id, Arc::new(records));
        debug!(user_id, count, "Replaced in-memory matches");
        Ok(())
    }

    async fn get_matches(
        &self,
        user_id: UserId,
        query: MatchQuery,
    ) -> StorageResult<Vec<MatchRecord>> {
        let Some(set) = self.snapshot(user_id) else {
            return Ok(Vec::new());
        };
        Ok(query.apply(set.iter().cloned()))
    }
}
