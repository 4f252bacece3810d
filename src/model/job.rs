use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::JobId;
use super::profile::{CompanySize, SalaryRange};
use crate::hashing::hash_text;

/// Work arrangement advertised by a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePolicy {
    Remote,
    Hybrid,
    Onsite,
}

impl RemotePolicy {
    pub fn is_distributed(self) -> bool {
        matches!(self, RemotePolicy::Remote | RemotePolicy::Hybrid)
    }
}

/// Seniority tag on a posting, with the years-of-experience band it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperienceLevel {
    Entry,
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
}

impl ExperienceLevel {
    /// Inclusive `(min, max)` years band.
    pub fn years(self) -> (f32, f32) {
        match self {
            ExperienceLevel::Entry => (0.0, 2.0),
            ExperienceLevel::Junior => (1.0, 3.0),
            ExperienceLevel::Mid => (3.0, 6.0),
            ExperienceLevel::Senior => (5.0, 10.0),
            ExperienceLevel::Lead => (7.0, 15.0),
            ExperienceLevel::Principal => (10.0, 20.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Lead => "lead",
            ExperienceLevel::Principal => "principal",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" | "entry-level" | "intern" => Ok(ExperienceLevel::Entry),
            "junior" => Ok(ExperienceLevel::Junior),
            "mid" | "mid-level" | "intermediate" => Ok(ExperienceLevel::Mid),
            "senior" => Ok(ExperienceLevel::Senior),
            "lead" | "staff" => Ok(ExperienceLevel::Lead),
            "principal" => Ok(ExperienceLevel::Principal),
            other => Err(format!("unknown experience level '{other}'")),
        }
    }
}

/// Employer fields flattened onto the posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployerSummary {
    pub name: String,
    #[serde(default)]
    pub size: Option<CompanySize>,
    /// Review-site rating on a 0–5 scale.
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub industry: Option<String>,
}

/// Job posting as served by the job provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    /// Raw seniority tag; parsed by the scorer so unknown tags degrade per item.
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary: SalaryRange,
    #[serde(default)]
    pub remote_policy: Option<RemotePolicy>,
    #[serde(default)]
    pub employer: Option<EmployerSummary>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Provider-supplied content hash. Computed from the text when absent.
    #[serde(default)]
    pub content_hash: Option<u64>,
}

fn default_active() -> bool {
    true
}

impl JobPosting {
    pub fn new(id: JobId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            required_skills: Vec::new(),
            preferred_skills: Vec::new(),
            experience_level: None,
            location: None,
            salary: SalaryRange::default(),
            remote_policy: None,
            employer: None,
            is_active: true,
            content_hash: None,
        }
    }

    /// Text the job embedding is derived from.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.description)
    }

    /// Hash that drives embedding reuse.
    pub fn content_hash(&self) -> u64 {
        self.content_hash
            .unwrap_or_else(|| hash_text(&self.embedding_text()))
    }
}
