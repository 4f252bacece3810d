//! On-disk index artifact.
//!
//! Ids, content tags and vectors live in a single rkyv archive guarded by a
//! BLAKE3 checksum, so the id mapping can never be published without the
//! vectors it describes.

use std::collections::HashSet;
use std::path::Path;

use rkyv::rancor::Error as RkyvError;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::debug;

use super::error::{VectorIndexError, VectorIndexResult};
use crate::hashing::hash_index_payload;
use crate::storage::atomic::write_atomic;
use crate::storage::mmap::{MmapError, MmapFileHandle};

pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Archive, Serialize, Deserialize, Debug, PartialEq)]
pub(crate) struct IndexSnapshot {
    pub format_version: u32,
    pub dim: u32,
    pub model_version: String,
    pub ids: Vec<u64>,
    pub tags: Vec<u64>,
    pub vectors: Vec<f32>,
    pub checksum: [u8; 32],
}

/// Decoded snapshot contents.
#[derive(Debug)]
pub(crate) struct SnapshotData {
    pub model_version: String,
    pub ids: Vec<u64>,
    pub tags: Vec<u64>,
    pub vectors: Vec<f32>,
}

pub(crate) fn write_snapshot(
    path: &Path,
    dim: usize,
    model_version: &str,
    ids: &[u64],
    tags: &[u64],
    vectors: &[f32],
) -> VectorIndexResult<()> {
    let dim = u32::try_from(dim).map_err(|_| {
        VectorIndexError::Serialization(format!("dimension {dim} does not fit the format"))
    })?;

    let snapshot = IndexSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        dim,
        model_version: model_version.to_string(),
        ids: ids.to_vec(),
        tags: tags.to_vec(),
        vectors: vectors.to_vec(),
        checksum: hash_index_payload(dim, ids, tags, vectors),
    };

    let bytes = rkyv::to_bytes::<RkyvError>(&snapshot)
        .map_err(|e| VectorIndexError::Serialization(format!("{:?}", e)))?;
    write_atomic(path, &bytes)?;

    debug!(path = %path.display(), entries = ids.len(), bytes = bytes.len(), "Index snapshot written");
    Ok(())
}

/// Loads and fully validates a snapshot. Any inconsistency is [`VectorIndexError::Corrupted`].
pub(crate) fn read_snapshot(path: &Path, expected_dim: usize) -> VectorIndexResult<SnapshotData> {
    let corrupted = |reason: String| VectorIndexError::Corrupted {
        path: path.to_path_buf(),
        reason,
    };

    let handle = match MmapFileHandle::open(path) {
        Ok(handle) => handle,
        Err(MmapError::Io(e)) => return Err(VectorIndexError::Io(e)),
        Err(e) => return Err(corrupted(e.to_string())),
    };

    let archived = handle
        .access_archived::<ArchivedIndexSnapshot>()
        .map_err(|e| corrupted(e.to_string()))?;

    if archived.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(corrupted(format!(
            "unsupported format version {}",
            archived.format_version
        )));
    }

    let dim = archived.dim.to_native();
    if dim as usize != expected_dim {
        return Err(corrupted(format!(
            "snapshot dimension {dim} does not match index dimension {expected_dim}"
        )));
    }

    let ids: Vec<u64> = archived.ids.iter().map(|v| v.to_native()).collect();
    let tags: Vec<u64> = archived.tags.iter().map(|v| v.to_native()).collect();
    let vectors: Vec<f32> = archived.vectors.iter().map(|v| v.to_native()).collect();

    if tags.len() != ids.len() {
        return Err(corrupted(format!(
            "{} ids but {} content tags",
            ids.len(),
            tags.len()
        )));
    }
    if vectors.len() != ids.len() * expected_dim {
        return Err(corrupted(format!(
            "{} ids but {} vector components (dim {expected_dim})",
            ids.len(),
            vectors.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(corrupted(format!("duplicate id {dup}")));
    }

    if hash_index_payload(dim, &ids, &tags, &vectors) != archived.checksum {
        return Err(corrupted("checksum mismatch".to_string()));
    }

    Ok(SnapshotData {
        model_version: archived.model_version.as_str().to_string(),
        ids,
        tags,
        vectors,
    })
}
