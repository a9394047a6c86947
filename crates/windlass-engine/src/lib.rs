//! Windlass Engine - recursive window-tree extraction over a predicates
//! frame.
//!
//! The engine consumes a compiled [`windlass_config::TaskConfig`] and an
//! in-memory [`PredicateFrame`], walks the window dependency tree
//! depth-first, and returns every realization that satisfies all window
//! constraints.

pub mod aggregate;
pub mod constraints;
pub mod error;
pub mod extract;
pub mod frame;
pub mod query;
pub mod result;

pub use aggregate::{aggregate_event_bound, aggregate_temporal, Anchor, WindowAggregate};
pub use error::{EngineError, SchemaError};
pub use extract::{Realization, WindowSnapshot};
pub use frame::{EventRow, PredicateFrame};
pub use query::query;
pub use result::{CohortRow, CohortTable};
