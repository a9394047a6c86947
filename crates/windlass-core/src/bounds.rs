//! Window bound types consumed by the aggregation kernel.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::error::{ConfigError, ConfigResult};

/// Which endpoints of an interval are included, in temporal order
/// (left = earlier instant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Both,
    Left,
    Right,
    None,
}

impl Closed {
    pub fn from_flags(left_inclusive: bool, right_inclusive: bool) -> Self {
        match (left_inclusive, right_inclusive) {
            (true, true) => Closed::Both,
            (true, false) => Closed::Left,
            (false, true) => Closed::Right,
            (false, false) => Closed::None,
        }
    }

    pub fn includes_left(self) -> bool {
        matches!(self, Closed::Both | Closed::Left)
    }

    pub fn includes_right(self) -> bool {
        matches!(self, Closed::Both | Closed::Right)
    }
}

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Closed::Both => write!(f, "both"),
            Closed::Left => write!(f, "left"),
            Closed::Right => write!(f, "right"),
            Closed::None => write!(f, "none"),
        }
    }
}

/// A rolling window of fixed signed size, shifted from its anchor by a
/// fixed offset.
///
/// The window spans `anchor + offset` to `anchor + offset + window_size`;
/// a negative `window_size` looks backwards. Inclusivity flags apply in
/// temporal order regardless of the sign of `window_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalBounds {
    pub left_inclusive: bool,
    pub window_size: Duration,
    pub right_inclusive: bool,
    pub offset: Duration,
}

impl TemporalBounds {
    pub fn new(left_inclusive: bool, window_size: Duration, right_inclusive: bool) -> Self {
        Self {
            left_inclusive,
            window_size,
            right_inclusive,
            offset: Duration::zero(),
        }
    }

    pub fn closed(&self) -> Closed {
        Closed::from_flags(self.left_inclusive, self.right_inclusive)
    }

    /// Shift the whole window by an extra offset, as accumulated along a
    /// chain of temporal edges in the window tree.
    pub fn shifted(&self, extra: Duration) -> Self {
        Self {
            offset: self.offset + extra,
            ..self.clone()
        }
    }

    /// The window's edges for a given anchor: `(start, end)` in the sense
    /// of the window definition, which is chronologically reversed when
    /// `window_size` is negative.
    pub fn window_edges(&self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = anchor + self.offset;
        (start, start + self.window_size)
    }

    /// The window's chronological span `(earliest, latest)`.
    pub fn chronological_span(&self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let (a, b) = self.window_edges(anchor);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Whether the bound event is sought after the anchor row or before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDirection {
    /// The window runs from the anchor row forward to the bound event.
    Forward,
    /// The window runs from the bound event forward to the anchor row.
    Backward,
}

/// What marks a row as a valid bound for an event-bounded window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundTarget {
    /// Rows where the named predicate column is positive.
    Predicate(String),
    /// The chronologically first row of the subject's record.
    RecordStart,
    /// The chronologically last row of the subject's record.
    RecordEnd,
}

impl BoundTarget {
    pub fn from_name(name: &str) -> Self {
        match name {
            crate::predicate::RECORD_START_COLUMN => BoundTarget::RecordStart,
            crate::predicate::RECORD_END_COLUMN => BoundTarget::RecordEnd,
            _ => BoundTarget::Predicate(name.to_string()),
        }
    }

    pub fn predicate_name(&self) -> Option<&str> {
        match self {
            BoundTarget::Predicate(name) => Some(name),
            _ => None,
        }
    }
}

/// A window delimited by the nearest row satisfying a boundary predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBounds {
    pub left_inclusive: bool,
    pub target: BoundTarget,
    pub direction: BoundDirection,
    pub right_inclusive: bool,
    pub offset: Duration,
}

impl EventBounds {
    pub fn new(
        left_inclusive: bool,
        target: BoundTarget,
        direction: BoundDirection,
        right_inclusive: bool,
    ) -> Self {
        Self {
            left_inclusive,
            target,
            direction,
            right_inclusive,
            offset: Duration::zero(),
        }
    }

    /// A record edge can only bound the side of the window it belongs to:
    /// the record start is never sought forward, the record end never
    /// backward.
    pub fn validate_direction(&self, window: &str) -> ConfigResult<()> {
        match (&self.target, self.direction) {
            (BoundTarget::RecordStart, BoundDirection::Forward) => {
                Err(ConfigError::RecordStartAsEnd(window.to_string()))
            }
            (BoundTarget::RecordEnd, BoundDirection::Backward) => {
                Err(ConfigError::RecordEndAsStart(window.to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn closed(&self) -> Closed {
        Closed::from_flags(self.left_inclusive, self.right_inclusive)
    }

    pub fn shifted(&self, extra: Duration) -> Self {
        Self {
            offset: self.offset + extra,
            ..self.clone()
        }
    }
}

/// The bounds attached to one edge of the window tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelBounds {
    Temporal(TemporalBounds),
    Event(EventBounds),
}

impl KernelBounds {
    pub fn is_temporal(&self) -> bool {
        matches!(self, KernelBounds::Temporal(_))
    }
}

/// An inclusive `(min, max)` constraint on a predicate count; an absent
/// bound leaves that side unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl CountBounds {
    pub fn new(min: Option<i64>, max: Option<i64>) -> ConfigResult<Self> {
        match (min, max) {
            (None, None) => Err(ConfigError::InvalidConstraint {
                predicate: String::new(),
                reason: "both bounds are unconstrained".into(),
            }),
            (Some(lo), Some(hi)) if hi < lo => Err(ConfigError::InvalidConstraint {
                predicate: String::new(),
                reason: format!("max {hi} is below min {lo}"),
            }),
            _ => Ok(Self { min, max }),
        }
    }

    pub fn contains(&self, count: i64) -> bool {
        self.min.map_or(true, |lo| count >= lo) && self.max.map_or(true, |hi| count <= hi)
    }
}

impl fmt::Display for CountBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_bound = |b: Option<i64>| b.map_or("None".to_string(), |v| v.to_string());
        write!(f, "({}, {})", fmt_bound(self.min), fmt_bound(self.max))
    }
}
