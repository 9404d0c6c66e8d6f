//! Per-user running totals over joined reviews

use crate::join::JoinedReview;
use rayon::prelude::*;
use std::collections::HashMap;

/// Running sums for one user. `merge` is associative and commutative, so
/// partial totals built on any split of the rows combine to the same result.
/// Integer sums are widened to i128 so no sum of i64 inputs can wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReviewTotals {
    /// Number of joined reviews folded in
    pub review_rows: u64,
    pub total_review_length: i128,
    pub total_consistency: f64,
    pub total_useful: i128,
}

impl ReviewTotals {
    pub fn add(&mut self, row: &JoinedReview) {
        self.review_rows += row.count;
        self.total_review_length += i128::from(row.review_length);
        self.total_consistency += row.consistency();
        self.total_useful += i128::from(row.useful_votes);
    }

    pub fn merge(mut self, other: ReviewTotals) -> ReviewTotals {
        self.review_rows += other.review_rows;
        self.total_review_length += other.total_review_length;
        self.total_consistency += other.total_consistency;
        self.total_useful += other.total_useful;
        self
    }
}

/// One summary row per user id
#[derive(Debug, Clone, PartialEq)]
pub struct UserReviewAggregate {
    pub user_id: String,
    pub totals: ReviewTotals,
}

/// Partial aggregation of one chunk of rows, keyed by user id.
pub type PartialAggregates = HashMap<String, ReviewTotals>;

pub fn aggregate_chunk(rows: &[JoinedReview]) -> PartialAggregates {
    let mut partial = PartialAggregates::new();
    for row in rows {
        fold_row(&mut partial, row);
    }
    partial
}

pub fn merge_partials(mut left: PartialAggregates, right: PartialAggregates) -> PartialAggregates {
    if left.len() < right.len() {
        return merge_partials(right, left);
    }
    for (user_id, totals) in right {
        let entry = left.entry(user_id).or_default();
        *entry = entry.merge(totals);
    }
    left
}

fn fold_row(partial: &mut PartialAggregates, row: &JoinedReview) {
    match partial.get_mut(&row.user_id) {
        Some(totals) => totals.add(row),
        None => {
            let mut totals = ReviewTotals::default();
            totals.add(row);
            partial.insert(row.user_id.clone(), totals);
        }
    }
}

/// Groups joined reviews by user and sums them in parallel.
///
/// Output is sorted by user id.
pub fn aggregate_by_user(rows: &[JoinedReview]) -> Vec<UserReviewAggregate> {
    let merged = rows
        .par_iter()
        .fold(PartialAggregates::new, |mut partial, row| {
            fold_row(&mut partial, row);
            partial
        })
        .reduce(PartialAggregates::new, merge_partials);

    finish(merged)
}

/// Turns merged partials into the sorted summary rows.
pub fn finish(merged: PartialAggregates) -> Vec<UserReviewAggregate> {
    let mut aggregates: Vec<UserReviewAggregate> = merged
        .into_iter()
        .map(|(user_id, totals)| UserReviewAggregate { user_id, totals })
        .collect();
    aggregates.sort_unstable_by(|a, b| a.user_id.cmp(&b.user_id));
    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user: &str, length: i64, stars: f64, business_stars: f64, useful: i64) -> JoinedReview {
        JoinedReview {
            user_id: user.to_string(),
            review_length: length,
            stars,
            useful_votes: useful,
            count: 1,
            business_stars,
        }
    }

    #[test]
    fn sums_every_row_of_a_group() {
        let rows = vec![
            row("u1", 100, 5.0, 4.0, 3),
            row("u2", 10, 1.0, 1.0, 0),
            row("u1", 50, 2.0, 4.5, 1),
        ];
        let aggregates = aggregate_by_user(&rows);
        assert_eq!(aggregates.len(), 2);

        let u1 = &aggregates[0];
        assert_eq!(u1.user_id, "u1");
        assert_eq!(u1.totals.review_rows, 2);
        assert_eq!(u1.totals.total_review_length, 150);
        assert_eq!(u1.totals.total_consistency, -1.5);
        assert_eq!(u1.totals.total_useful, 4);
    }

    #[test]
    fn output_is_sorted_by_user() {
        let rows: Vec<_> = ["c", "a", "b", "a"]
            .iter()
            .map(|u| row(u, 1, 3.0, 3.0, 0))
            .collect();
        let ids: Vec<_> = aggregate_by_user(&rows)
            .into_iter()
            .map(|a| a.user_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn chunked_aggregation_matches_single_pass() {
        let rows = vec![
            row("u1", 100, 5.0, 4.0, 3),
            row("u1", 20, 3.5, 4.0, 0),
            row("u2", 70, 4.0, 2.5, 9),
            row("u1", 50, 2.0, 4.5, 1),
            row("u2", 30, 1.0, 2.5, 2),
        ];
        let single = finish(aggregate_chunk(&rows));
        let (left, right) = rows.split_at(2);
        let merged = finish(merge_partials(aggregate_chunk(left), aggregate_chunk(right)));
        assert_eq!(single, merged);
    }

    #[test]
    fn extreme_counters_do_not_wrap() {
        let rows = vec![
            row("u1", i64::MAX, 3.0, 3.0, i64::MAX),
            row("u1", i64::MAX, 3.0, 3.0, i64::MAX),
        ];
        let single = finish(aggregate_chunk(&rows));
        assert_eq!(single[0].totals.total_useful, 2 * i128::from(i64::MAX));

        let (left, right) = rows.split_at(1);
        let merged = finish(merge_partials(aggregate_chunk(left), aggregate_chunk(right)));
        assert_eq!(single, merged);
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(aggregate_by_user(&[]).is_empty());
    }
}
