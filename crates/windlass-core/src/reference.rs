//! Symbolic references between window boundaries.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One side of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Start,
    End,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Start => Side::End,
            Side::End => Side::Start,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Start => write!(f, "start"),
            Side::End => write!(f, "end"),
        }
    }
}

/// The anchor a boundary expression is resolved against: the trigger event
/// or another window's start or end boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Trigger,
    Window { name: String, side: Side },
}

impl Reference {
    pub fn window(name: impl Into<String>, side: Side) -> Self {
        Reference::Window {
            name: name.into(),
            side,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Trigger => write!(f, "trigger"),
            Reference::Window { name, side } => write!(f, "{name}.{side}"),
        }
    }
}

/// A resolved window-boundary expression.
///
/// `Null` stands in for the edge of the subject's record; `Identity` pins
/// the boundary to the referenced instant; `Offset` shifts it by a fixed
/// signed delta; `Next`/`Prev` walk to the nearest row on which the named
/// predicate fires. Structural equality lets the tree builder merge
/// boundary nodes that resolve to the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySpec {
    Null,
    Identity(Reference),
    Offset(Reference, Duration),
    Next(Reference, String),
    Prev(Reference, String),
}

impl BoundarySpec {
    /// The reference this boundary is anchored to, if any.
    pub fn reference(&self) -> Option<&Reference> {
        match self {
            BoundarySpec::Null => None,
            BoundarySpec::Identity(r)
            | BoundarySpec::Offset(r, _)
            | BoundarySpec::Next(r, _)
            | BoundarySpec::Prev(r, _) => Some(r),
        }
    }
}

impl fmt::Display for BoundarySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundarySpec::Null => write!(f, "NULL"),
            BoundarySpec::Identity(r) => write!(f, "{r}"),
            BoundarySpec::Offset(r, delta) => {
                let micros = delta.num_microseconds().unwrap_or(i64::MAX);
                if micros < 0 {
                    write!(f, "{r} - {}s", -delta.num_seconds())
                } else {
                    write!(f, "{r} + {}s", delta.num_seconds())
                }
            }
            BoundarySpec::Next(r, pred) => write!(f, "{r} -> {pred}"),
            BoundarySpec::Prev(r, pred) => write!(f, "{r} <- {pred}"),
        }
    }
}
