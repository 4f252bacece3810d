use crate::config::WeightConfig;
use crate::model::{JobId, MatchRecord, UserId};

/// The six sub-scores for one profile/job pair, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub semantic: f32,
    pub skill: f32,
    pub experience: f32,
    pub location: f32,
    pub salary: f32,
    pub company: f32,
}

impl SubScores {
    /// `Σ weight_i * score_i`, clamped to `[0, 1]`. A NaN sum yields 0.
    pub fn weighted(&self, weights: &WeightConfig) -> f32 {
        let sum = weights.semantic_score * self.semantic
            + weights.skill_match * self.skill
            + weights.experience_match * self.experience
            + weights.location_match * self.location
            + weights.salary_match * self.salary
            + weights.company_match * self.company;

        if sum.is_nan() {
            0.0
        } else {
            sum.clamp(0.0, 1.0)
        }
    }
}

/// Full scoring result for one pair, before it is bound to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub scores: SubScores,
    pub overall: f32,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reasons: Vec<String>,
}

impl ScoreBreakdown {
    pub fn into_record(self, user_id: UserId, job_id: JobId) -> MatchRecord {
        MatchRecord {
            user_id,
            job_id,
            semantic_score: self.scores.semantic,
            skill_match_score: self.scores.skill,
            experience_match_score: self.scores.experience,
            location_match_score: self.scores.location,
            salary_match_score: self.scores.salary,
            company_match_score: self.scores.company,
            overall_score: self.overall,
            matched_skills: self.matched_skills,
            missing_skills: self.missing_skills,
            reasons: self.reasons,
        }
    }
}
