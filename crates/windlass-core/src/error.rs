//! Configuration error types

use thiserror::Error;

/// Errors raised while parsing or compiling a task configuration.
///
/// Every variant is fatal: the configuration is rejected at the first
/// invalidity and nothing is retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("invalid YAML document: {0}")]
    Yaml(String),

    #[error("configuration must define at least one predicate")]
    EmptyPredicates,

    #[error("configuration must define a trigger predicate")]
    MissingTrigger,

    #[error("configuration must define at least one window")]
    EmptyWindows,

    #[error("invalid duration literal '{literal}': {reason}")]
    InvalidDuration { literal: String, reason: String },

    #[error("predicate name '{0}' is invalid; names are composed of alphanumeric or '_' characters")]
    InvalidPredicateName(String),

    #[error("window name '{0}' is invalid; names are composed of alphanumeric or '_' characters")]
    InvalidWindowName(String),

    #[error("predicate '{name}' is defined more than once")]
    DuplicatePredicate { name: String },

    #[error("invalid derived predicate expression '{expr}': {reason}")]
    InvalidDerivedExpr { expr: String, reason: String },

    #[error("'{referenced_by}' references predicate '{name}' which is not defined")]
    UnknownPredicate { name: String, referenced_by: String },

    #[error("derived predicate graph contains a cycle through '{0}'")]
    PredicateCycle(String),

    #[error("window '{referenced_by}' references undefined window '{name}'")]
    UnknownWindow { name: String, referenced_by: String },

    #[error("window '{0}' participates in a reference cycle; the window graph must be a tree rooted at the trigger")]
    WindowReferenceCycle(String),

    #[error("invalid boundary expression '{boundary}': {reason}")]
    InvalidBoundary { boundary: String, reason: String },

    #[error("window '{window}' cannot span from the start of the record to the end of the record")]
    BothEndsOpen { window: String },

    #[error("exactly one of the start or end of window '{window}' must reference the other; got '{start}' / '{end}'")]
    NoAnchor {
        window: String,
        start: String,
        end: String,
    },

    #[error("start of window '{window}' will not occur before its end; got '{start}' / '{end}'")]
    WindowOrder {
        window: String,
        start: String,
        end: String,
    },

    #[error("window '{window}' has no extent but carries {field}; its boundaries resolve to the same instant")]
    EmptyWindowExtent { window: String, field: String },

    #[error("the start of the record cannot bound the end of a window (window '{0}')")]
    RecordStartAsEnd(String),

    #[error("the end of the record cannot bound the start of a window (window '{0}')")]
    RecordEndAsStart(String),

    #[error("invalid constraint for '{predicate}': {reason}")]
    InvalidConstraint { predicate: String, reason: String },

    #[error("only one window can carry a label; found {0}")]
    MultipleLabels(String),

    #[error("only one window can carry an index_timestamp; found {0}")]
    MultipleIndexTimestamps(String),

    #[error("index_timestamp must be 'start' or 'end'; got '{value}' for window '{window}'")]
    InvalidIndexTimestamp { window: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
