use std::path::PathBuf;

use thiserror::Error;

use crate::model::{JobId, UserId};
use crate::storage::mmap::MmapError;

/// Match repository failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mmap error: {0}")]
    Mmap(#[from] MmapError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted match file {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("record for user {found} passed to replace_matches for user {expected}")]
    UserMismatch { expected: UserId, found: UserId },

    #[error("duplicate record for user {user_id}, job {job_id}")]
    DuplicateJob { user_id: UserId, job_id: JobId },

    #[error("write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
