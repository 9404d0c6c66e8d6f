//! Keyed indexes and the review-business inner join

use crate::config::JoinPolicy;
use crate::error::{PipelineError, Result};
use crate::records::{BusinessRecord, ReviewRecord};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Rows that survived a join plus the number of rows it discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome<T> {
    pub rows: Vec<T>,
    pub dropped: usize,
}

/// A review after the business join. The business id is projected away;
/// only the business star rating is carried forward.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedReview {
    pub user_id: String,
    pub review_length: i64,
    pub stars: f64,
    pub useful_votes: i64,
    pub count: u64,
    pub business_stars: f64,
}

impl JoinedReview {
    /// Signed distance between this review and its business's rating
    pub fn consistency(&self) -> f64 {
        self.stars - self.business_stars
    }
}

/// Builds a key -> record index, enforcing one record per key.
///
/// Non-strict: the first record in input order wins. Strict: any duplicate is
/// a `JoinKeyMismatch`.
pub fn index_unique<T, F>(
    records: Vec<T>,
    kind: &str,
    policy: JoinPolicy,
    key: F,
) -> Result<HashMap<String, T>>
where
    F: Fn(&T) -> &str,
{
    let mut index = HashMap::with_capacity(records.len());
    let mut duplicates = 0usize;

    for record in records {
        let k = key(&record);
        if index.contains_key(k) {
            if policy.strict {
                return Err(PipelineError::JoinKeyMismatch {
                    key: k.to_string(),
                    reason: format!("duplicate {} record", kind),
                });
            }
            duplicates += 1;
            continue;
        }
        index.insert(k.to_string(), record);
    }

    if duplicates > 0 {
        warn!(
            "Ignored {} duplicate {} records (first occurrence kept)",
            duplicates, kind
        );
    }
    Ok(index)
}

/// Business id -> business star rating
pub fn index_businesses(
    businesses: Vec<BusinessRecord>,
    policy: JoinPolicy,
) -> Result<HashMap<String, f64>> {
    let index = index_unique(businesses, "business", policy, |b| b.business_id.as_str())?;
    Ok(index
        .into_iter()
        .map(|(id, business)| (id, business.stars))
        .collect())
}

/// Inner join of reviews to businesses on business id.
///
/// Output order follows the review input order.
pub fn join_reviews(
    reviews: Vec<ReviewRecord>,
    business_stars: &HashMap<String, f64>,
    policy: JoinPolicy,
) -> Result<JoinOutcome<JoinedReview>> {
    let total = reviews.len();
    let matched: Vec<Option<JoinedReview>> = reviews
        .into_par_iter()
        .map(|review| match business_stars.get(&review.business_id) {
            Some(&stars) => Ok(Some(JoinedReview {
                user_id: review.user_id,
                review_length: review.review_length,
                stars: review.stars,
                useful_votes: review.useful_votes,
                count: review.count,
                business_stars: stars,
            })),
            None if policy.strict => Err(PipelineError::JoinKeyMismatch {
                key: review.business_id,
                reason: "review references an unknown business".to_string(),
            }),
            None => Ok(None),
        })
        .collect::<Result<_>>()?;

    let rows: Vec<JoinedReview> = matched.into_iter().flatten().collect();
    let dropped = total - rows.len();
    debug!("Review-business join: {} matched, {} dropped", rows.len(), dropped);

    Ok(JoinOutcome { rows, dropped })
}
