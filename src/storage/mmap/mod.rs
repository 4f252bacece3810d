//! Read-only memory maps over rkyv archives.
//!
//! Files are only ever replaced by rename, so a mapping keeps observing the
//! version it was opened on even while a writer publishes a new one.

pub mod error;

pub use error::{MmapError, MmapResult};

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rkyv::Portable;
use rkyv::api::high::{HighValidator, access};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error as RkyvError;

pub const RKYV_ALIGNMENT: usize = 16;

/// Shared read-only mapping of a whole file.
#[derive(Clone)]
pub struct MmapFileHandle {
    inner: Arc<Mmap>,
    path: Arc<PathBuf>,
}

impl std::fmt::Debug for MmapFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapFileHandle")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

impl MmapFileHandle {
    pub fn open<P: AsRef<Path>>(path: P) -> MmapResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        if file.metadata()?.len() == 0 {
            return Err(MmapError::EmptyFile);
        }

        // SAFETY: the file is opened read-only and writers never modify a
        // published file in place (they rename a new one over it).
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            inner: Arc::new(mmap),
            path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.deref()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates and returns the archived root object.
    pub fn access_archived<T>(&self) -> MmapResult<&T>
    where
        T: Portable + for<'a> CheckBytes<HighValidator<'a, RkyvError>>,
    {
        let data = self.as_slice();

        if !(data.as_ptr() as usize).is_multiple_of(RKYV_ALIGNMENT) {
            return Err(MmapError::AlignmentError {
                alignment: RKYV_ALIGNMENT,
            });
        }

        access::<T, RkyvError>(data).map_err(|e| MmapError::ValidationFailed(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rkyv::{Archive, Deserialize, Serialize};

    #[derive(Archive, Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        id: u64,
        values: Vec<f32>,
    }

    #[test]
    fn test_open_empty_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.rkyv");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            MmapFileHandle::open(&path),
            Err(MmapError::EmptyFile)
        ));
    }

    #[test]
    fn test_access_archived_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sample.rkyv");
        let sample = Sample {
            id: 42,
            values: vec![0.5, -0.25],
        };
        let bytes = rkyv::to_bytes::<RkyvError>(&sample).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let handle = MmapFileHandle::open(&path).unwrap();
        let archived = handle.access_archived::<ArchivedSample>().unwrap();
        assert_eq!(archived.id, 42);
        assert_eq!(archived.values.len(), 2);
        assert_eq!(handle.path(), path.as_path());
    }

    #[test]
    fn test_access_archived_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.rkyv");
        std::fs::write(&path, [0xFFu8; 7]).unwrap();

        let handle = MmapFileHandle::open(&path).unwrap();
        assert!(matches!(
            handle.access_archived::<ArchivedSample>(),
            Err(MmapError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_mapping_survives_rename_over() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("live.rkyv");
        let first = rkyv::to_bytes::<RkyvError>(&Sample { id: 1, values: vec![] }).unwrap();
        std::fs::write(&path, &first).unwrap();
        let handle = MmapFileHandle::open(&path).unwrap();

        let next = dir.path().join("next.rkyv");
        let second = rkyv::to_bytes::<RkyvError>(&Sample { id: 2, values: vec![] }).unwrap();
        std::fs::write(&next, &second).unwrap();
        std::fs::rename(&next, &path).unwrap();

        assert_eq!(handle.access_archived::<ArchivedSample>().unwrap().id, 1);
        let reopened = MmapFileHandle::open(&path).unwrap();
        assert_eq!(reopened.access_archived::<ArchivedSample>().unwrap().id, 2);
    }
}
