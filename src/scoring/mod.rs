//! Deterministic profile/job scoring.
//!
//! [`Scorer`] computes six independent sub-scores and folds them into one
//! weighted overall score. Malformed attributes never abort a pair: the
//! affected sub-score takes its neutral value (see [`neutral`]) and a warning
//! is logged.
//!
//! | Sub-score  | Neutral |
//! |------------|---------|
//! | semantic   | 0.0     |
//! | skill      | 0.5     |
//! | experience | 0.7     |
//! | location   | 0.8     |
//! | salary     | 0.7     |
//! | company    | 0.5     |

pub mod error;
pub mod reasons;
pub mod scorer;
pub mod skills;
pub mod types;


pub use error::ScoringError;
pub use scorer::Scorer;
pub use skills::SkillMatch;
pub use types::{ScoreBreakdown, SubScores};

/// Fallback values for sub-scores whose inputs are missing or malformed.
pub mod neutral {
    /// A pair whose vectors cannot be compared earns no semantic credit.
    pub const SEMANTIC: f32 = 0.0;
    pub const SKILL: f32 = 0.5;
    pub const EXPERIENCE: f32 = 0.7;
    pub const LOCATION: f32 = 0.8;
    pub const SALARY: f32 = 0.7;
    pub const COMPANY: f32 = 0.5;
}
