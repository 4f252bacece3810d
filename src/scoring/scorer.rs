use tracing::{instrument, warn};

use crate::config::{MatchingConfig, WeightConfig};
use crate::embedding::EmbeddingVector;
use crate::model::{ExperienceLevel, JobPosting, Profile};

use super::error::ScoringError;
use super::neutral;
use super::reasons::build_reasons;
use super::skills::match_skills;
use super::types::{ScoreBreakdown, SubScores};

/// Per-year penalty below a level's band.
const UNDER_QUALIFIED_DECAY: f32 = 0.2;
const UNDER_QUALIFIED_FLOOR: f32 = 0.3;
/// Per-year penalty above a level's band.
const OVER_QUALIFIED_DECAY: f32 = 0.1;
const OVER_QUALIFIED_FLOOR: f32 = 0.6;

const SALARY_GAP_FLOOR: f32 = 0.2;
/// Candidate ceiling when only a floor is given.
const DEFAULT_CEILING_FACTOR: f64 = 1.5;

const COMPANY_BASE: f32 = 0.5;
const COMPANY_SIZE_BONUS: f32 = 0.3;
const COMPANY_RATING_WEIGHT: f32 = 0.2;
const MAX_RATING: f32 = 5.0;

/// Pure profile/job scorer.
///
/// Identical inputs always produce identical output; the only side effect is a
/// warning when an attribute is malformed and a neutral value is substituted.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: WeightConfig,
    infer_description_skills: bool,
}

impl Scorer {
    pub fn new(weights: WeightConfig) -> Self {
        Self {
            weights,
            infer_description_skills: false,
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.weights).with_description_skills(config.infer_description_skills)
    }

    pub fn with_description_skills(mut self, enabled: bool) -> Self {
        self.infer_description_skills = enabled;
        self
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    #[instrument(level = "debug", skip_all, fields(user_id = profile.id, job_id = job.id))]
    pub fn score(
        &self,
        profile: &Profile,
        job: &JobPosting,
        profile_vec: &EmbeddingVector,
        job_vec: &EmbeddingVector,
    ) -> ScoreBreakdown {
        let skills = match_skills(profile, job, self.infer_description_skills);

        let scores = SubScores {
            semantic: or_neutral(
                "semantic",
                semantic_score(profile_vec, job_vec),
                neutral::SEMANTIC,
            ),
            skill: skills.ratio.unwrap_or(neutral::SKILL),
            experience: or_neutral(
                "experience",
                experience_score(profile.experience_years, job.experience_level.as_deref()),
                neutral::EXPERIENCE,
            ),
            location: location_score(profile, job),
            salary: or_neutral("salary", salary_score(profile, job), neutral::SALARY),
            company: or_neutral("company", company_score(profile, job), neutral::COMPANY),
        };

        let overall = scores.weighted(&self.weights);
        let reasons = build_reasons(&scores, &skills.matched, profile, job);

        ScoreBreakdown {
            scores,
            overall,
            matched_skills: skills.matched,
            missing_skills: skills.missing,
            reasons,
        }
    }
}

fn or_neutral(component: &'static str, result: Result<f32, ScoringError>, fallback: f32) -> f32 {
    match result {
        Ok(score) => score,
        Err(error) => {
            warn!(component, error = %error, fallback, "Malformed attribute, using neutral score");
            fallback
        }
    }
}

/// Inner product of two unit vectors, floored at 0.
pub fn semantic_score(
    profile_vec: &EmbeddingVector,
    job_vec: &EmbeddingVector,
) -> Result<f32, ScoringError> {
    if profile_vec.dim() != job_vec.dim() {
        return Err(ScoringError::InvalidEmbedding {
            reason: format!(
                "dimension mismatch: profile {} vs job {}",
                profile_vec.dim(),
                job_vec.dim()
            ),
        });
    }
    let similarity = profile_vec.dot(job_vec);
    if !similarity.is_finite() {
        return Err(ScoringError::InvalidEmbedding {
            reason: "non-finite similarity".to_string(),
        });
    }
    Ok(similarity.clamp(0.0, 1.0))
}

/// 1.0 inside the level's band; linear decay outside it, with a harsher slope
/// and lower floor for under-qualification.
pub fn experience_score(years: Option<f32>, level: Option<&str>) -> Result<f32, ScoringError> {
    let (Some(years), Some(level)) = (years, level) else {
        return Ok(neutral::EXPERIENCE);
    };
    if level.trim().is_empty() {
        return Ok(neutral::EXPERIENCE);
    }
    if !years.is_finite() || years < 0.0 {
        return Err(ScoringError::InvalidExperience { years });
    }

    let level: ExperienceLevel = level
        .parse()
        .map_err(|_| ScoringError::UnknownExperienceLevel {
            level: level.to_string(),
        })?;
    let (low, high) = level.years();

    let score = if years < low {
        (1.0 - (low - years) * UNDER_QUALIFIED_DECAY).max(UNDER_QUALIFIED_FLOOR)
    } else if years > high {
        (1.0 - (years - high) * OVER_QUALIFIED_DECAY).max(OVER_QUALIFIED_FLOOR)
    } else {
        1.0
    };
    Ok(score)
}

/// Substring match on locations, then the remote/hybrid allowance.
pub fn location_score(profile: &Profile, job: &JobPosting) -> f32 {
    let job_location = match job.location.as_deref().map(str::trim) {
        Some(location) if !location.is_empty() => location.to_lowercase(),
        _ => return neutral::LOCATION,
    };
    let preferred: Vec<String> = profile
        .preferred_locations
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if preferred.is_empty() {
        return neutral::LOCATION;
    }

    if preferred
        .iter()
        .any(|pref| job_location.contains(pref.as_str()) || pref.contains(job_location.as_str()))
    {
        return 1.0;
    }

    let distributed = job.remote_policy.is_some_and(|p| p.is_distributed());
    let accepts = profile
        .remote_preference
        .is_some_and(|p| p.accepts_distributed());
    if distributed && accepts { 0.9 } else { 0.4 }
}

/// Overlap of the offered band with the desired band, relative to the desired
/// band's width.
pub fn salary_score(profile: &Profile, job: &JobPosting) -> Result<f32, ScoringError> {
    let (Some(user_min), Some(job_min)) = (
        profile.desired_salary.min.filter(|&v| v > 0),
        job.salary.min.filter(|&v| v > 0),
    ) else {
        return Ok(neutral::SALARY);
    };

    let user_min = user_min as f64;
    let user_max = profile
        .desired_salary
        .max
        .map(|v| v as f64)
        .unwrap_or(user_min * DEFAULT_CEILING_FACTOR);
    let job_min = job_min as f64;
    let job_max = job.salary.max.map(|v| v as f64).unwrap_or(job_min);

    if user_max < user_min {
        return Err(ScoringError::InvalidSalary {
            reason: format!("desired max {user_max} is below desired min {user_min}"),
        });
    }
    if job_max < job_min {
        return Err(ScoringError::InvalidSalary {
            reason: format!("offered max {job_max} is below offered min {job_min}"),
        });
    }

    if job_max >= user_min && job_min <= user_max {
        let width = user_max - user_min;
        if width <= 0.0 {
            return Ok(1.0);
        }
        let overlap = user_max.min(job_max) - user_min.max(job_min);
        return Ok((overlap / width).min(1.0) as f32);
    }

    if job_max < user_min {
        let gap = user_min - job_max;
        Ok(((1.0 - gap / user_min) as f32).max(SALARY_GAP_FLOOR))
    } else {
        Ok(1.0)
    }
}

/// Base score, size preference bonus, and a rating bonus scaled to `[0, 0.2]`.
pub fn company_score(profile: &Profile, job: &JobPosting) -> Result<f32, ScoringError> {
    let Some(employer) = job.employer.as_ref() else {
        return Ok(neutral::COMPANY);
    };

    let mut score = COMPANY_BASE;

    if employer
        .size
        .is_some_and(|size| profile.preferred_company_sizes.contains(&size))
    {
        score += COMPANY_SIZE_BONUS;
    }

    if let Some(rating) = employer.rating {
        if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
            return Err(ScoringError::InvalidRating { rating });
        }
        score += COMPANY_RATING_WEIGHT * (rating / MAX_RATING);
    }

    Ok(score.min(1.0))
}
