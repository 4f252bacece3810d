use std::cmp::Ordering;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use super::{JobId, UserId};

/// Persisted, scored association between one user and one job posting.
///
/// Always written wholesale by the pipeline; never patched field by field.
#[derive(
    Archive, RkyvDeserialize, RkyvSerialize, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
pub struct MatchRecord {
    pub user_id: UserId,
    pub job_id: JobId,
    pub semantic_score: f32,
    pub skill_match_score: f32,
    pub experience_match_score: f32,
    pub location_match_score: f32,
    pub salary_match_score: f32,
    pub company_match_score: f32,
    pub overall_score: f32,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reasons: Vec<String>,
}

/// Ranking order: overall score descending, then job id ascending.
pub fn rank_order(a: &MatchRecord, b: &MatchRecord) -> Ordering {
    b.overall_score
        .total_cmp(&a.overall_score)
        .then_with(|| a.job_id.cmp(&b.job_id))
}
