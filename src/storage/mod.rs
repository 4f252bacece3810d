//! Persistence: mmap helpers, atomic file replacement and the match repository.

pub mod atomic;
pub mod error;
pub mod matches;
pub mod mmap;

pub use atomic::write_atomic;
pub use error::{StorageError, StorageResult};
pub use matches::{FileMatchStore, MatchQuery, MatchRepository, MemoryMatchStore, UserLocks};
