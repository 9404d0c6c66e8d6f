//! User join and per-user averaging

use crate::aggregate::UserReviewAggregate;
use crate::config::JoinPolicy;
use crate::error::{PipelineError, Result};
use crate::join::{index_unique, JoinOutcome};
use crate::records::UserRecord;
use rayon::prelude::*;
use tracing::debug;

/// Terminal row of the averaging stage, one per user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFeature {
    pub user: UserRecord,
    pub avg_review_length: f64,
    pub avg_consistency: f64,
    pub avg_useful: f64,
    /// Carried forward unaveraged
    pub total_useful: i64,
}

/// Divides the review totals by the user's platform review count.
///
/// The count must be positive; zero or negative counts are rejected.
pub fn average(user: UserRecord, aggregate: &UserReviewAggregate) -> Result<UserFeature> {
    if user.review_count <= 0 {
        return Err(PipelineError::DivisionByZero {
            user_id: user.user_id,
            review_count: user.review_count,
        });
    }
    let count = user.review_count as f64;
    let totals = &aggregate.totals;
    let total_useful =
        i64::try_from(totals.total_useful).map_err(|_| PipelineError::CounterOverflow {
            user_id: user.user_id.clone(),
            field: "total_useful",
        })?;

    Ok(UserFeature {
        avg_review_length: totals.total_review_length as f64 / count,
        avg_consistency: totals.total_consistency / count,
        avg_useful: totals.total_useful as f64 / count,
        total_useful,
        user,
    })
}

/// Inner join of users to their review aggregates, followed by averaging.
///
/// Rows come out in aggregate order (sorted by user id). `dropped` counts
/// users without reviews plus aggregates without a user record.
pub fn join_users(
    users: Vec<UserRecord>,
    aggregates: &[UserReviewAggregate],
    policy: JoinPolicy,
) -> Result<JoinOutcome<UserFeature>> {
    let user_total = users.len();
    let mut index = index_unique(users, "user", policy, |u| u.user_id.as_str())?;
    let unique_users = index.len();

    // 1:1 join, so each group holds exactly one (user, aggregate) pair
    let pairs: Vec<(UserRecord, &UserReviewAggregate)> = aggregates
        .iter()
        .filter_map(|aggregate| {
            index
                .remove(&aggregate.user_id)
                .map(|user| (user, aggregate))
        })
        .collect();

    let orphan_aggregates = aggregates.len() - pairs.len();
    let users_without_reviews = unique_users - pairs.len();
    debug!(
        "User join: {} of {} users matched, {} aggregates without user",
        pairs.len(),
        user_total,
        orphan_aggregates
    );

    let rows = pairs
        .into_par_iter()
        .map(|(user, aggregate)| average(user, aggregate))
        .collect::<Result<Vec<_>>>()?;

    Ok(JoinOutcome {
        rows,
        dropped: orphan_aggregates + users_without_reviews,
    })
}
