//! Windlass Core - shared types for the windlass cohort extraction engine.
//!
//! This crate provides the time model, window bound types, and predicate
//! definitions consumed by the configuration compiler and the query engine.

pub mod bounds;
pub mod error;
pub mod predicate;
pub mod reference;
pub mod time;

pub use bounds::{
    BoundDirection, BoundTarget, Closed, CountBounds, EventBounds, KernelBounds, TemporalBounds,
};
pub use error::{ConfigError, ConfigResult};
pub use predicate::{
    derived_evaluation_order, is_special_column, DerivedExpr, DerivedPredicate, PlainPredicate,
    PredicateCode, PredicateDef, ANY_EVENT_COLUMN, RECORD_END_COLUMN, RECORD_START_COLUMN,
};
pub use reference::{BoundarySpec, Reference, Side};
pub use time::parse_duration;
