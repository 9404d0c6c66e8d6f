//! Error types shared by every pipeline stage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure is fatal to the run; no stage isolates errors per record.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required field is absent or has the wrong JSON type
    #[error("malformed {kind} record at line {line}: field `{field}` {reason}")]
    MalformedRecord {
        kind: &'static str,
        line: usize,
        field: &'static str,
        reason: String,
    },

    /// A raw line is not valid JSON
    #[error("invalid JSON in {kind} record at line {line}: {source}")]
    Json {
        kind: &'static str,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Strict join checking found a duplicated or unmatched key
    #[error("join key mismatch on `{key}`: {reason}")]
    JoinKeyMismatch { key: String, reason: String },

    /// A user whose review_count is not positive reached the averaging stage
    #[error("user `{user_id}` has review_count {review_count}, averages are undefined")]
    DivisionByZero { user_id: String, review_count: i64 },

    /// A per-user total no longer fits the output counter
    #[error("user `{user_id}`: {field} overflows a 64-bit counter")]
    CounterOverflow { user_id: String, field: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn missing(kind: &'static str, line: usize, field: &'static str) -> Self {
        PipelineError::MalformedRecord {
            kind,
            line,
            field,
            reason: "is missing".to_string(),
        }
    }

    pub(crate) fn wrong_type(
        kind: &'static str,
        line: usize,
        field: &'static str,
        expected: &str,
    ) -> Self {
        PipelineError::MalformedRecord {
            kind,
            line,
            field,
            reason: format!("is not {}", expected),
        }
    }
}
