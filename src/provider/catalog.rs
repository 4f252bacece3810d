//! In-process catalog of profiles and postings, optionally loaded from JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::error::{ProviderError, ProviderResult};
use super::{JobProvider, ProfileProvider};
use crate::model::{JobId, JobPosting, Profile, UserId};

pub const PROFILES_FILE: &str = "profiles.json";
pub const JOBS_FILE: &str = "jobs.json";

#[derive(Debug, Default)]
struct CatalogInner {
    profiles: BTreeMap<UserId, Profile>,
    jobs: BTreeMap<JobId, JobPosting>,
}

/// Shared, mutable catalog implementing both provider traits.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    inner: Arc<RwLock<CatalogInner>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries win on repeated ids.
    pub fn from_parts(profiles: Vec<Profile>, jobs: Vec<JobPosting>) -> Self {
        let catalog = Self::new();
        {
            let mut inner = catalog.inner.write();
            inner.profiles.extend(profiles.into_iter().map(|p| (p.id, p)));
            inner.jobs.extend(jobs.into_iter().map(|j| (j.id, j)));
        }
        catalog
    }

    /// Reads `profiles.json` and `jobs.json` (JSON arrays) from `dir`.
    ///
    /// A missing file counts as an empty list.
    pub fn load_dir(dir: &Path) -> ProviderResult<Self> {
        let profiles: Vec<Profile> = read_json_array(&dir.join(PROFILES_FILE))?;
        let jobs: Vec<JobPosting> = read_json_array(&dir.join(JOBS_FILE))?;
        info!(
            dir = %dir.display(),
            profiles = profiles.len(),
            jobs = jobs.len(),
            "Loaded catalog"
        );
        Ok(Self::from_parts(profiles, jobs))
    }

    pub fn upsert_profile(&self, profile: Profile) {
        self.inner.write().profiles.insert(profile.id, profile);
    }

    pub fn upsert_job(&self, job: JobPosting) {
        self.inner.write().jobs.insert(job.id, job);
    }

    /// Returns `false` if the posting is unknown.
    pub fn set_job_active(&self, job_id: JobId, active: bool) -> bool {
        match self.inner.write().jobs.get_mut(&job_id) {
            Some(job) => {
                job.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn profile_count(&self) -> usize {
        self.inner.read().profiles.len()
    }

    pub fn job_count(&self) -> usize {
        self.inner.read().jobs.len()
    }
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> ProviderResult<Vec<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Catalog file missing, treating as empty");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ProviderError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ProfileProvider for Catalog {
    async fn profile(&self, user_id: UserId) -> ProviderResult<Option<Profile>> {
        Ok(self.inner.read().profiles.get(&user_id).cloned())
    }

    async fn user_ids(&self) -> ProviderResult<Vec<UserId>> {
        Ok(self.inner.read().profiles.keys().copied().collect())
    }
}

#[async_trait]
impl JobProvider for Catalog {
    async fn active_jobs(&self) -> ProviderResult<Vec<JobPosting>> {
        Ok(self
            .inner
            .read()
            .jobs
            .values()
            .filter(|j| j.is_active)
            .cloned()
            .collect())
    }
}
