//! File-backed matching configuration (weights, thresholds, shortlist sizes).
//!
//! Unknown keys are rejected at every level, and [`MatchingConfig::validate`]
//! runs on every load path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::constants::{DEFAULT_MINIMUM_MATCH_SCORE, DEFAULT_SHORTLIST_SIZE, DEFAULT_TOP_K};

/// Relative contribution of each sub-score to the overall score.
///
/// Weights are non-negative and need not sum to 1; the overall score is clamped
/// to `[0, 1]` after weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightConfig {
    pub semantic_score: f32,
    pub skill_match: f32,
    pub experience_match: f32,
    pub location_match: f32,
    pub salary_match: f32,
    pub company_match: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            semantic_score: 0.30,
            skill_match: 0.25,
            experience_match: 0.20,
            location_match: 0.10,
            salary_match: 0.10,
            company_match: 0.05,
        }
    }
}

impl WeightConfig {
    /// `(key, weight)` pairs in declaration order.
    pub fn entries(&self) -> [(&'static str, f32); 6] {
        [
            ("semantic_score", self.semantic_score),
            ("skill_match", self.skill_match),
            ("experience_match", self.experience_match),
            ("location_match", self.location_match),
            ("salary_match", self.salary_match),
            ("company_match", self.company_match),
        ]
    }

    pub fn total(&self) -> f32 {
        self.entries().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, weight) in self.entries() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    key,
                    value: weight,
                });
            }
        }
        Ok(())
    }
}

/// Score cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Records below this overall score are not persisted.
    pub minimum_match_score: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            minimum_match_score: DEFAULT_MINIMUM_MATCH_SCORE,
        }
    }
}

/// Everything that shapes a ranking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub weights: WeightConfig,
    pub thresholds: Thresholds,
    /// Candidates pulled from the vector index before full scoring (N).
    pub shortlist_size: usize,
    /// Matches kept per user (K).
    pub top_k: usize,
    /// Also treat well-known technologies named in a description as job skills.
    pub infer_description_skills: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            thresholds: Thresholds::default(),
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
            top_k: DEFAULT_TOP_K,
            infer_description_skills: false,
        }
    }
}

impl MatchingConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidMatchingConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        let min = self.thresholds.minimum_match_score;
        if !min.is_finite() || !(0.0..=1.0).contains(&min) {
            return Err(ConfigError::InvalidThreshold { value: min });
        }

        if self.top_k == 0 {
            return Err(ConfigError::InvalidMatchingConfig {
                reason: "top_k must be positive".to_string(),
            });
        }
        if self.shortlist_size < self.top_k {
            return Err(ConfigError::InvalidMatchingConfig {
                reason: format!(
                    "shortlist_size ({}) must be at least top_k ({})",
                    self.shortlist_size, self.top_k
                ),
            });
        }

        Ok(())
    }
}
