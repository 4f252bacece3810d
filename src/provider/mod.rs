//! Read-side contracts for profiles and job postings.
//!
//! The pipeline only ever sees flattened DTOs ([`Profile`], [`JobPosting`] with
//! an inline [`EmployerSummary`](crate::model::EmployerSummary)); providers
//! resolve any joins before handing data over.

pub mod catalog;
pub mod error;


pub use catalog::{Catalog, JOBS_FILE, PROFILES_FILE};
pub use error::{ProviderError, ProviderResult};

use async_trait::async_trait;

use crate::model::{JobPosting, Profile, UserId};

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// `Ok(None)` when the user has no profile.
    async fn profile(&self, user_id: UserId) -> ProviderResult<Option<Profile>>;

    /// Every user with a profile, ascending.
    async fn user_ids(&self) -> ProviderResult<Vec<UserId>>;
}

#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Postings with `is_active` set, ascending by id.
    async fn active_jobs(&self) -> ProviderResult<Vec<JobPosting>>;
}
