//! Typed decoders for the three raw record streams

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde_json::Value;

// Macro for fetching a field that must be present and non-null
macro_rules! require_field {
    ($json:expr, $kind:expr, $line:expr, $field:expr) => {
        $json
            .get($field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| PipelineError::missing($kind, $line, $field))
    };
}

// Macro for extracting required string fields from JSON
macro_rules! require_str {
    ($json:expr, $kind:expr, $line:expr, $field:expr) => {
        require_field!($json, $kind, $line, $field).and_then(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| PipelineError::wrong_type($kind, $line, $field, "a string"))
        })
    };
}

// Macro for extracting required integer fields from JSON
macro_rules! require_i64 {
    ($json:expr, $kind:expr, $line:expr, $field:expr) => {
        require_field!($json, $kind, $line, $field).and_then(|v| {
            v.as_i64()
                .ok_or_else(|| PipelineError::wrong_type($kind, $line, $field, "an integer"))
        })
    };
}

// Macro for extracting required numeric fields from JSON (ints widen to f64)
macro_rules! require_f64 {
    ($json:expr, $kind:expr, $line:expr, $field:expr) => {
        require_field!($json, $kind, $line, $field).and_then(|v| {
            v.as_f64()
                .ok_or_else(|| PipelineError::wrong_type($kind, $line, $field, "a number"))
        })
    };
}

const REVIEW: &str = "review";
const BUSINESS: &str = "business";
const USER: &str = "user";

/// Days per "month" in the account-age approximation
const DAYS_PER_MONTH: f64 = 30.0;

const COMPLIMENT_FIELDS: [&str; 11] = [
    "compliment_hot",
    "compliment_cool",
    "compliment_more",
    "compliment_list",
    "compliment_cute",
    "compliment_note",
    "compliment_funny",
    "compliment_plain",
    "compliment_photos",
    "compliment_profile",
    "compliment_writer",
];

const VOTE_FIELDS: [&str; 3] = ["useful", "funny", "cool"];

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub user_id: String,
    pub business_id: String,
    pub review_length: i64,
    pub stars: f64,
    pub useful_votes: i64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRecord {
    pub business_id: String,
    pub stars: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub review_count: i64,
    pub fans: i64,
    pub elite: bool,
    pub age_months: f64,
    pub compliment_sum: i64,
    pub votes_sum: i64,
}

/// Inputs the user decoder needs beyond the raw line
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    pub target_year: i32,
    /// "now" for the account-age computation
    pub reference_date: NaiveDate,
}

fn parse_json(kind: &'static str, line: usize, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|source| PipelineError::Json { kind, line, source })
}

pub fn parse_review(raw: &str, line: usize) -> Result<ReviewRecord> {
    let json = parse_json(REVIEW, line, raw)?;
    Ok(ReviewRecord {
        user_id: require_str!(json, REVIEW, line, "user_id")?,
        business_id: require_str!(json, REVIEW, line, "business_id")?,
        review_length: require_i64!(json, REVIEW, line, "length")?,
        stars: require_f64!(json, REVIEW, line, "stars")?,
        useful_votes: require_i64!(json, REVIEW, line, "useful")?,
        count: 1,
    })
}

pub fn parse_business(raw: &str, line: usize) -> Result<BusinessRecord> {
    let json = parse_json(BUSINESS, line, raw)?;
    Ok(BusinessRecord {
        business_id: require_str!(json, BUSINESS, line, "business_id")?,
        stars: require_f64!(json, BUSINESS, line, "stars")?,
    })
}

pub fn parse_user(raw: &str, line: usize, ctx: &ParseContext) -> Result<UserRecord> {
    let json = parse_json(USER, line, raw)?;

    let mut compliment_sum = 0i64;
    for field in COMPLIMENT_FIELDS {
        let value = require_i64!(json, USER, line, field)?;
        compliment_sum = add_counter(compliment_sum, value, line, field)?;
    }
    let mut votes_sum = 0i64;
    for field in VOTE_FIELDS {
        let value = require_i64!(json, USER, line, field)?;
        votes_sum = add_counter(votes_sum, value, line, field)?;
    }

    let since_raw = require_str!(json, USER, line, "yelping_since")?;
    let since = parse_since(&since_raw)
        .ok_or_else(|| PipelineError::wrong_type(USER, line, "yelping_since", "a YYYY-MM-DD date"))?;
    let age_months = (ctx.reference_date - since).num_days() as f64 / DAYS_PER_MONTH;

    let elite_field = require_field!(json, USER, line, "elite")?;
    let elite = is_elite_for(elite_field, ctx.target_year).ok_or_else(|| {
        PipelineError::wrong_type(USER, line, "elite", "a list of years or a comma-separated string")
    })?;

    Ok(UserRecord {
        user_id: require_str!(json, USER, line, "user_id")?,
        review_count: require_i64!(json, USER, line, "review_count")?,
        fans: require_i64!(json, USER, line, "fans")?,
        elite,
        age_months,
        compliment_sum,
        votes_sum,
    })
}

fn add_counter(sum: i64, value: i64, line: usize, field: &'static str) -> Result<i64> {
    sum.checked_add(value).ok_or_else(|| PipelineError::MalformedRecord {
        kind: USER,
        line,
        field,
        reason: "overflows the counter sum".to_string(),
    })
}

/// Accepts a bare date or a date followed by a time of day.
fn parse_since(raw: &str) -> Option<NaiveDate> {
    let date = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// `None` when the field has neither supported shape.
fn is_elite_for(field: &Value, target_year: i32) -> Option<bool> {
    let year = target_year.to_string();
    match field {
        Value::String(s) => Some(s.split(',').any(|token| token.trim() == year)),
        Value::Array(items) => Some(items.iter().any(|item| match item {
            Value::Number(n) => n.as_i64() == Some(target_year as i64),
            Value::String(s) => s.trim() == year,
            _ => false,
        })),
        _ => None,
    }
}
