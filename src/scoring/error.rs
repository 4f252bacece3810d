use thiserror::Error;

/// Malformed input attribute for a single sub-score.
///
/// Never aborts scoring: the affected sub-score falls back to its neutral value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("invalid salary range: {reason}")]
    InvalidSalary { reason: String },

    #[error("unknown experience level '{level}'")]
    UnknownExperienceLevel { level: String },

    #[error("invalid years of experience: {years}")]
    InvalidExperience { years: f32 },

    #[error("employer rating {rating} is outside 0..=5")]
    InvalidRating { rating: f32 },

    #[error("invalid embedding: {reason}")]
    InvalidEmbedding { reason: String },
}
