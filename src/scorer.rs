//! Threshold-vote classifier with multiplicative weight decay.
//!
//! Each feature dimension votes "elite" when it exceeds its threshold and
//! "not elite" otherwise, weighted by its current weight. After every row, the
//! dimensions whose comparison contradicted the row's true elite flag are
//! decayed by `1 - learning_rate`. The update mutates state shared by every
//! later row, so results depend on the order rows are scored in.

use crate::config::{ScoringConfig, FEATURE_DIMS};
use crate::features::UserFeature;

pub type FeatureVector = [f64; FEATURE_DIMS];

/// Feature order matches the threshold order.
pub fn feature_vector(feature: &UserFeature) -> FeatureVector {
    let user = &feature.user;
    [
        feature.avg_useful,
        feature.total_useful as f64,
        user.review_count as f64,
        user.fans as f64,
        feature.avg_review_length,
        feature.avg_consistency,
        user.compliment_sum as f64,
        user.votes_sum as f64,
        user.age_months,
    ]
}

/// Fixed per-dimension reference values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EliteThresholds(pub FeatureVector);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierPhase {
    /// No row has been scored yet
    Fresh,
    Updated,
}

/// Weighted vote totals for one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub elite: f64,
    pub not_elite: f64,
}

impl Vote {
    pub fn predicts_elite(&self) -> bool {
        self.elite > self.not_elite
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierState {
    weights: FeatureVector,
    rows_seen: u64,
}

impl ClassifierState {
    pub fn fresh(initial_weight: f64) -> Self {
        Self {
            weights: [initial_weight; FEATURE_DIMS],
            rows_seen: 0,
        }
    }

    pub fn weights(&self) -> &FeatureVector {
        &self.weights
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn phase(&self) -> ClassifierPhase {
        if self.rows_seen == 0 {
            ClassifierPhase::Fresh
        } else {
            ClassifierPhase::Updated
        }
    }

    pub fn vote(&self, features: &FeatureVector, thresholds: &EliteThresholds) -> Vote {
        let mut vote = Vote {
            elite: 0.0,
            not_elite: 0.0,
        };
        for ((value, threshold), weight) in features.iter().zip(&thresholds.0).zip(&self.weights) {
            if value > threshold {
                vote.elite += weight;
            } else {
                vote.not_elite += weight;
            }
        }
        vote
    }

    /// Decays each dimension whose comparison disagrees with `is_elite`.
    /// A value equal to its threshold never disagrees.
    pub fn update(
        &mut self,
        features: &FeatureVector,
        thresholds: &EliteThresholds,
        is_elite: bool,
        learning_rate: f64,
    ) {
        let decay = 1.0 - learning_rate;
        for ((value, threshold), weight) in features
            .iter()
            .zip(&thresholds.0)
            .zip(self.weights.iter_mut())
        {
            let disagrees = (is_elite && value < threshold) || (!is_elite && value > threshold);
            if disagrees {
                *weight *= decay;
            }
        }
        self.rows_seen += 1;
    }
}

/// Output row: label 1 means predicted elite
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUser {
    pub user_id: String,
    pub predicted_label: u8,
    /// Weights after this row's update
    pub weights: FeatureVector,
}

pub struct AdaptiveScorer {
    thresholds: EliteThresholds,
    learning_rate: f64,
    state: ClassifierState,
}

impl AdaptiveScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            thresholds: EliteThresholds(config.thresholds),
            learning_rate: config.learning_rate,
            state: ClassifierState::fresh(config.initial_weight),
        }
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Votes with the current weights, then updates them from the row's
    /// true elite flag.
    pub fn score(&mut self, feature: &UserFeature) -> ScoredUser {
        let features = feature_vector(feature);
        let vote = self.state.vote(&features, &self.thresholds);
        self.state.update(
            &features,
            &self.thresholds,
            feature.user.elite,
            self.learning_rate,
        );

        ScoredUser {
            user_id: feature.user.user_id.clone(),
            predicted_label: u8::from(vote.predicts_elite()),
            weights: self.state.weights,
        }
    }

    pub fn into_state(self) -> ClassifierState {
        self.state
    }
}

/// Everything one scoring pass produced
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRun {
    pub rows: Vec<ScoredUser>,
    pub final_state: ClassifierState,
}

/// Scores `features` strictly in slice order with one fresh classifier.
pub fn score_in_order(features: &[UserFeature], config: &ScoringConfig) -> ScoringRun {
    let (scorer, rows) = features.iter().fold(
        (AdaptiveScorer::new(config), Vec::with_capacity(features.len())),
        |(mut scorer, mut rows), feature| {
            rows.push(scorer.score(feature));
            (scorer, rows)
        },
    );

    ScoringRun {
        rows,
        final_state: scorer.into_state(),
    }
}
