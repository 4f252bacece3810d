use serde::{Deserialize, Serialize};

use super::UserId;
use crate::hashing::hash_text;

/// Salary band in whole currency units. Either bound may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

impl SalaryRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn from_min(min: u64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

/// Candidate stance on remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePreference {
    Remote,
    Hybrid,
    Onsite,
    #[serde(alias = "any")]
    Flexible,
}

impl RemotePreference {
    /// Whether the candidate would take a remote or hybrid role.
    pub fn accepts_distributed(self) -> bool {
        !matches!(self, RemotePreference::Onsite)
    }
}

/// Employer headcount bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Startup,
    Small,
    Medium,
    Large,
    Enterprise,
}

/// Candidate profile as served by the profile provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub current_title: Option<String>,
    #[serde(default)]
    pub resume_text: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<f32>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub remote_preference: Option<RemotePreference>,
    #[serde(default)]
    pub desired_salary: SalaryRange,
    #[serde(default)]
    pub preferred_company_sizes: Vec<CompanySize>,
    #[serde(default)]
    pub target_industries: Vec<String>,
}

impl Profile {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Text the profile embedding is derived from: title, skills, then resume.
    pub fn corpus_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.skills.len() + 2);
        if let Some(title) = self.current_title.as_deref() {
            parts.push(title);
        }
        parts.extend(self.skills.iter().map(String::as_str));
        if let Some(resume) = self.resume_text.as_deref() {
            parts.push(resume);
        }
        parts.join(" ")
    }

    /// Fingerprint of [`corpus_text`](Self::corpus_text).
    pub fn corpus_hash(&self) -> u64 {
        hash_text(&self.corpus_text())
    }
}
