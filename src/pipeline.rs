//! End-to-end driver: parse, join, aggregate, average, score

use crate::aggregate::aggregate_by_user;
use crate::config::{JoinPolicy, ScoringConfig};
use crate::features::{join_users, UserFeature};
use crate::input::{get_memory_usage, read_records, ProcessingStats, RecordKind};
use crate::join::{index_businesses, join_reviews};
use crate::records::{
    parse_business, parse_review, parse_user, BusinessRecord, ParseContext, ReviewRecord,
    UserRecord,
};
use crate::scorer::{score_in_order, ScoringRun};
use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub user_files: Vec<PathBuf>,
    pub business_files: Vec<PathBuf>,
    pub review_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub scoring: ScoringConfig,
    pub join_policy: JoinPolicy,
    pub reference_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub users_parsed: usize,
    pub businesses_parsed: usize,
    pub reviews_parsed: usize,
    pub reviews_joined: usize,
    pub reviews_dropped: usize,
    pub users_dropped: usize,
    pub users_scored: usize,
    pub predicted_elite: usize,
    pub actual_elite: usize,
    /// Rows whose prediction matched the true elite flag
    pub agreements: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!("Final Processing Statistics:");
        info!("  Users parsed: {}", self.users_parsed);
        info!("  Businesses parsed: {}", self.businesses_parsed);
        info!("  Reviews parsed: {}", self.reviews_parsed);
        info!("  Reviews joined: {} (dropped {})", self.reviews_joined, self.reviews_dropped);
        info!("  Users scored: {} (dropped {})", self.users_scored, self.users_dropped);
        info!("  Predicted elite: {} / actual elite: {}", self.predicted_elite, self.actual_elite);
        info!("  Agreement: {} of {}", self.agreements, self.users_scored);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub features: Vec<UserFeature>,
    pub scoring: ScoringRun,
    pub summary: RunSummary,
}

/// Runs stages 2-5 over already decoded records.
///
/// Stages 2-4 may run on any number of rayon workers; scoring is a single
/// ordered fold over the user rows sorted by user id.
pub fn process_records(
    users: Vec<UserRecord>,
    businesses: Vec<BusinessRecord>,
    reviews: Vec<ReviewRecord>,
    scoring: &ScoringConfig,
    policy: JoinPolicy,
) -> crate::error::Result<PipelineOutput> {
    let mut summary = RunSummary {
        users_parsed: users.len(),
        businesses_parsed: businesses.len(),
        reviews_parsed: reviews.len(),
        ..RunSummary::default()
    };

    let business_stars = index_businesses(businesses, policy)?;
    let joined = join_reviews(reviews, &business_stars, policy)?;
    summary.reviews_joined = joined.rows.len();
    summary.reviews_dropped = joined.dropped;

    let aggregates = aggregate_by_user(&joined.rows);
    info!("Aggregated reviews for {} users", aggregates.len());

    let averaged = join_users(users, &aggregates, policy)?;
    summary.users_dropped = averaged.dropped;

    let mut features = averaged.rows;
    features.sort_by(|a, b| a.user.user_id.cmp(&b.user.user_id));

    let run = score_in_order(&features, scoring);

    summary.users_scored = run.rows.len();
    summary.actual_elite = features.iter().filter(|f| f.user.elite).count();
    summary.predicted_elite = run.rows.iter().filter(|r| r.predicted_label == 1).count();
    summary.agreements = features
        .iter()
        .zip(&run.rows)
        .filter(|(f, r)| f.user.elite == (r.predicted_label == 1))
        .count();
    info!("Final weights: {:?}", run.final_state.weights());

    Ok(PipelineOutput {
        features,
        scoring: run,
        summary,
    })
}

/// Decodes the three streams, then runs [`process_records`].
pub fn run_pipeline(inputs: &PipelineInputs, options: &PipelineOptions) -> Result<PipelineOutput> {
    options.scoring.validate()?;
    let stats = ProcessingStats::new();
    let ctx = ParseContext {
        target_year: options.scoring.target_year,
        reference_date: options.reference_date,
    };

    let businesses = read_records(
        &inputs.business_files,
        RecordKind::Business,
        parse_business,
        &stats,
    )?;
    let reviews = read_records(&inputs.review_files, RecordKind::Review, parse_review, &stats)?;
    let users = read_records(
        &inputs.user_files,
        RecordKind::User,
        |raw, line| parse_user(raw, line, &ctx),
        &stats,
    )?;

    info!(
        "Parsed {} files ({} users, {} businesses, {} reviews). Memory: {}",
        stats.files_processed.load(Ordering::Relaxed),
        stats.users_parsed.load(Ordering::Relaxed),
        stats.businesses_parsed.load(Ordering::Relaxed),
        stats.reviews_parsed.load(Ordering::Relaxed),
        get_memory_usage()
    );

    let output = process_records(users, businesses, reviews, &options.scoring, options.join_policy)?;
    Ok(output)
}
