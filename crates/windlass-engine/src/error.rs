//! Engine error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The predicates frame violates its input contract.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("predicates table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("predicates table declares column '{0}' more than once")]
    DuplicateColumn(String),

    #[error("column '{column}' carries {actual} values for a row expecting {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("the (subject_id, timestamp) columns must be unique; subject {subject_id} repeats {timestamp}")]
    DuplicateEvent {
        subject_id: i64,
        timestamp: DateTime<Utc>,
    },

    #[error("predicate counts are non-negative; column '{column}' holds {value} for subject {subject_id}")]
    NegativeCount {
        column: String,
        subject_id: i64,
        value: i64,
    },

    #[error("static predicate '{0}' not found in the predicates table")]
    MissingStaticPredicate(String),
}

/// Fatal failures surfaced by the query engine. Nothing is retried; a
/// failing recursion frame propagates upward and the partial result is
/// discarded.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("extraction failed under node '{node}': {message}")]
    Extraction { node: String, message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
