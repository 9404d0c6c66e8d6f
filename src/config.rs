//! Scoring parameters and join policy

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::Path;

/// Number of weighted feature dimensions in the classifier
pub const FEATURE_DIMS: usize = 9;

/// Reference values per dimension, in feature-vector order:
/// avg_useful, total_useful, review_count, fans, avg_review_length,
/// avg_consistency, compliment_sum, votes_sum, age_months
pub const DEFAULT_THRESHOLDS: [f64; FEATURE_DIMS] =
    [102.0, 4.0, 100.0, 10.0, 40.0, 73.14, 1.0, 0.0018, 1.0];

pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_INITIAL_WEIGHT: f64 = 1.0;
pub const DEFAULT_TARGET_YEAR: i32 = 2018;

/// Classifier configuration, optionally loaded from a TOML file.
///
/// Every key is optional; missing keys take the compiled defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub thresholds: [f64; FEATURE_DIMS],
    pub learning_rate: f64,
    pub initial_weight: f64,
    pub target_year: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS,
            learning_rate: DEFAULT_LEARNING_RATE,
            initial_weight: DEFAULT_INITIAL_WEIGHT,
            target_year: DEFAULT_TARGET_YEAR,
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScoringConfig = toml::from_str(content)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(PipelineError::InvalidConfig(format!(
                "learning_rate must lie in [0, 1], got {}",
                self.learning_rate
            )));
        }
        // Weights only decay, so this also bounds every weight of the run.
        if !(self.initial_weight > 0.0 && self.initial_weight <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "initial_weight must lie in (0, 1], got {}",
                self.initial_weight
            )));
        }
        if let Some(i) = self.thresholds.iter().position(|t| !t.is_finite()) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold {} is not finite",
                i
            )));
        }
        Ok(())
    }
}

/// How the two joins treat duplicated and unmatched keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinPolicy {
    /// Duplicate keys and reviews of unknown businesses become errors
    /// instead of first-match / silent drops.
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ScoringConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScoringConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let config = ScoringConfig::from_toml_str("learning_rate = 0.25\ntarget_year = 2017\n")
            .unwrap();
        assert_eq!(config.learning_rate, 0.25);
        assert_eq!(config.target_year, 2017);
        assert_eq!(config.thresholds, DEFAULT_THRESHOLDS);
    }

    #[test]
    fn rejects_out_of_range_learning_rate() {
        let err = ScoringConfig::from_toml_str("learning_rate = 1.5").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn initial_weight_is_bounded_to_unit_interval() {
        assert!(ScoringConfig::from_toml_str("initial_weight = 0.5").is_ok());
        assert!(ScoringConfig::from_toml_str("initial_weight = 1.0").is_ok());
        for bad in ["0.0", "-1.0", "1.5", "nan"] {
            let err = ScoringConfig::from_toml_str(&format!("initial_weight = {bad}")).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidConfig(_)), "accepted {bad}");
        }
    }

    #[test]
    fn rejects_wrong_threshold_count() {
        assert!(ScoringConfig::from_toml_str("thresholds = [1.0, 2.0]").is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(ScoringConfig::from_toml_str("learning_rat = 0.2").is_err());
    }
}
