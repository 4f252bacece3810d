//! Human-readable explanations attached to each match.

use crate::model::{JobPosting, Profile, RemotePolicy};

use super::types::SubScores;

const COMPETITIVE_SALARY_FLOOR: u64 = 100_000;

/// Builds the reasons list in a fixed order: semantic, skills, experience,
/// work arrangement, salary, industry.
pub fn build_reasons(
    scores: &SubScores,
    matched_skills: &[String],
    profile: &Profile,
    job: &JobPosting,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if scores.semantic > 0.8 {
        reasons.push("Strong semantic match with your background".to_string());
    } else if scores.semantic > 0.6 {
        reasons.push("Good alignment with your experience".to_string());
    }

    if scores.skill > 0.7 && !matched_skills.is_empty() {
        reasons.push(format!("Strong skill match: {}", head(matched_skills, 3)));
    } else if !matched_skills.is_empty() {
        reasons.push(format!("Skill overlap: {}", head(matched_skills, 2)));
    }

    if scores.experience > 0.8 {
        reasons.push("Perfect experience level match".to_string());
    } else if scores.experience > 0.6 {
        reasons.push("Good experience level fit".to_string());
    }

    match job.remote_policy {
        Some(RemotePolicy::Remote) => reasons.push("Remote work available".to_string()),
        Some(RemotePolicy::Hybrid) => reasons.push("Hybrid work option".to_string()),
        Some(RemotePolicy::Onsite) | None => {}
    }

    if job
        .salary
        .min
        .is_some_and(|min| min > COMPETITIVE_SALARY_FLOOR)
    {
        reasons.push("Competitive salary range".to_string());
    }

    if let Some(industry) = target_industry(profile, job) {
        reasons.push(format!("Employer in a target industry: {industry}"));
    }

    reasons
}

fn head(items: &[String], n: usize) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn target_industry<'a>(profile: &Profile, job: &'a JobPosting) -> Option<&'a str> {
    let industry = job.employer.as_ref()?.industry.as_deref()?.trim();
    if industry.is_empty() {
        return None;
    }
    profile
        .target_industries
        .iter()
        .any(|target| target.trim().eq_ignore_ascii_case(industry))
        .then_some(industry)
}
