use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::UserId;

const PRUNE_THRESHOLD: usize = 1024;

/// Per-user async mutual exclusion.
///
/// Holding the guard returned by [`lock`](Self::lock) serializes every other
/// caller for the same user; different users never contend.
#[derive(Debug, Default, Clone)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock();
            if map.len() >= PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            Arc::clone(map.entry(user_id).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of users with a live lock slot.
    pub fn tracked_users(&self) -> usize {
        self.inner.lock().len()
    }
}
