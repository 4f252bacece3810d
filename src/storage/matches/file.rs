use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rkyv::rancor::Error as RkyvError;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{MatchQuery, MatchRepository, UserLocks, prepare_records};
use crate::model::{MatchRecord, UserId};
use crate::storage::atomic::write_atomic;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::mmap::MmapFileHandle;

const MATCH_FILE_VERSION: u32 = 1;
const RKYV_EXTENSION: &str = "rkyv";

/// On-disk layout of one user's match set.
#[derive(Archive, Serialize, Deserialize, Debug, PartialEq)]
struct MatchFile {
    format_version: u32,
    user_id: UserId,
    records: Vec<MatchRecord>,
}

/// File-per-user match repository.
///
/// Each user's set is one rkyv archive at `<root>/<user_id>.rkyv`, replaced by an
/// atomic rename. Readers mmap whichever file is current, so a concurrent
/// replacement is invisible until it is complete.
#[derive(Debug, Clone)]
pub struct FileMatchStore {
    root: PathBuf,
    locks: UserLocks,
}

impl FileMatchStore {
    /// Creates a store rooted at `root` (created on first write).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: UserLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_path(&self, user_id: UserId) -> PathBuf {
        self.root.join(format!("{user_id}.{RKYV_EXTENSION}"))
    }

    /// Lists users with a persisted set.
    pub fn list_users(&self) -> StorageResult<Vec<UserId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut users = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if let Some(ext) = path.extension()
                && ext == RKYV_EXTENSION
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(id) = stem.parse::<UserId>()
            {
                users.push(id);
            }
        }
        users.sort_unstable();
        Ok(users)
    }

    fn write_set(path: &Path, user_id: UserId, records: Vec<MatchRecord>) -> StorageResult<()> {
        let file = MatchFile {
            format_version: MATCH_FILE_VERSION,
            user_id,
            records,
        };
        let bytes = rkyv::to_bytes::<RkyvError>(&file)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;
        write_atomic(path, &bytes)?;
        Ok(())
    }

    fn read_set(path: &Path, user_id: UserId, query: MatchQuery) -> StorageResult<Vec<MatchRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let handle = MmapFileHandle::open(path)?;
        let archived = handle
            .access_archived::<ArchivedMatchFile>()
            .map_err(|e| StorageError::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if archived.format_version != MATCH_FILE_VERSION {
            return Err(StorageError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("unsupported format version {}", archived.format_version),
            });
        }
        if archived.user_id != user_id {
            return Err(StorageError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("file belongs to user {}", archived.user_id),
            });
        }

        archived
            .records
            .iter()
            .filter(|r| query.admits(r.overall_score.to_native()))
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|r| {
                rkyv::deserialize::<MatchRecord, RkyvError>(r)
                    .map_err(|e| StorageError::Serialization(format!("{:?}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl MatchRepository for FileMatchStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_matches(
        &self,
        user_id: UserId,
        records: Vec<MatchRecord>,
    ) -> StorageResult<()> {
        let records = prepare_records(user_id, records)?;
        let _guard = self.locks.lock(user_id).await;

        let path = self.user_path(user_id);
        tokio::task::spawn_blocking(move || Self::write_set(&path, user_id, records))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        debug!(user_id, "Match file replaced");
        Ok(())
    }

    async fn get_matches(
        &self,
        user_id: UserId,
        query: MatchQuery,
    ) -> StorageResult<Vec<MatchRecord>> {
        let path = self.user_path(user_id);
        tokio::task::spawn_blocking(move || Self::read_set(&path, user_id, query))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
