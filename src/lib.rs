//! Yelp elite-user pipeline.
//!
//! Joins users, businesses and reviews into one feature row per user and
//! scores each user with an online threshold-vote classifier.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod features;
pub mod input;
pub mod join;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod scorer;

pub use config::{JoinPolicy, ScoringConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{process_records, run_pipeline, PipelineInputs, PipelineOptions, PipelineOutput};
pub use scorer::{score_in_order, AdaptiveScorer, ClassifierState, ScoredUser};
