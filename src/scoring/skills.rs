//! Case-insensitive skill overlap.

use std::collections::BTreeSet;

use crate::model::{JobPosting, Profile};

/// Technologies recognised in free-text descriptions when inference is enabled.
const DESCRIPTION_VOCABULARY: &[&str] = &[
    "agile",
    "api",
    "aws",
    "ci/cd",
    "data science",
    "docker",
    "elasticsearch",
    "git",
    "graphql",
    "java",
    "javascript",
    "jenkins",
    "kubernetes",
    "linux",
    "machine learning",
    "microservices",
    "mongodb",
    "node.js",
    "postgresql",
    "python",
    "pytorch",
    "react",
    "redis",
    "rest",
    "scrum",
    "sql",
    "tensorflow",
    "terraform",
];

/// Overlap between a candidate's skills and a posting's skills.
///
/// Both lists are normalised (trimmed, lowercased) and sorted, so the result is
/// independent of input order and casing.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillMatch {
    /// `|matched| / |job skills|`, or `None` when the posting lists no skills.
    pub ratio: Option<f32>,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

fn normalize(skill: &str) -> Option<String> {
    let skill = skill.trim();
    (!skill.is_empty()).then(|| skill.to_lowercase())
}

/// Job skills: required ∪ preferred, plus vocabulary hits from the description
/// when `infer_from_description` is set.
pub fn job_skills(job: &JobPosting, infer_from_description: bool) -> BTreeSet<String> {
    let mut skills: BTreeSet<String> = job
        .required_skills
        .iter()
        .chain(job.preferred_skills.iter())
        .filter_map(|s| normalize(s))
        .collect();

    if infer_from_description && !job.description.is_empty() {
        skills.extend(infer_skills(&job.description));
    }

    skills
}

pub fn match_skills(profile: &Profile, job: &JobPosting, infer_from_description: bool) -> SkillMatch {
    let wanted = job_skills(job, infer_from_description);
    if wanted.is_empty() {
        return SkillMatch {
            ratio: None,
            matched: Vec::new(),
            missing: Vec::new(),
        };
    }

    let have: BTreeSet<String> = profile.skills.iter().filter_map(|s| normalize(s)).collect();
    let (matched, missing): (Vec<String>, Vec<String>) =
        wanted.into_iter().partition(|skill| have.contains(skill));

    let total = matched.len() + missing.len();
    SkillMatch {
        ratio: Some(matched.len() as f32 / total as f32),
        matched,
        missing,
    }
}

/// Vocabulary terms that occur in `text` as whole tokens.
pub fn infer_skills(text: &str) -> BTreeSet<String> {
    let text = text.to_lowercase();
    DESCRIPTION_VOCABULARY
        .iter()
        .filter(|term| contains_token(&text, term))
        .map(|term| (*term).to_string())
        .collect()
}

fn contains_token(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}
