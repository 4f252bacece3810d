//! Read-side data contracts.
//!
//! Profiles and postings are owned by external stores and arrive here as flat
//! DTOs (employer fields are denormalized onto the posting). The core only owns
//! [`MatchRecord`].

mod job;
mod profile;
mod record;


pub use job::{EmployerSummary, ExperienceLevel, JobPosting, RemotePolicy};
pub use profile::{CompanySize, Profile, RemotePreference, SalaryRange};
pub use record::{ArchivedMatchRecord, MatchRecord, rank_order};

/// External user identifier.
pub type UserId = u64;

/// External job posting identifier.
pub type JobId = u64;
