//! Aggregation kernel.
//!
//! Two pure operations over the predicates frame, both grouped strictly by
//! subject and emitting one row per anchor:
//!
//! - [`aggregate_temporal`]: rolling predicate-count sums over a fixed
//!   signed window around each anchor.
//! - [`aggregate_event_bound`]: predicate-count sums between each anchor
//!   (plus a fixed offset) and the nearest row on which a boundary
//!   predicate fires, computed by per-subject cumulative-sum differencing.
//!
//! Subjects are independent, so both kernels fan out across subject groups
//! with rayon; the extractor above stays single-threaded.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

use windlass_core::{BoundDirection, BoundTarget, Closed, EventBounds, TemporalBounds};

use crate::frame::PredicateFrame;

/// A prospective anchor: one `(subject, timestamp)` pivot for a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anchor {
    pub subject_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// One aggregated window, keyed by the anchor it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregate {
    pub anchor: Anchor,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Predicate counts in frame column order.
    pub counts: Vec<i64>,
}

/// Per-subject view with cumulative sums: `prefix[c][i]` is the sum of
/// column `c` over the first `i` rows of the subject.
struct SubjectView<'a> {
    timestamps: &'a [DateTime<Utc>],
    columns: Vec<&'a [i64]>,
    prefix: Vec<Vec<i64>>,
}

impl<'a> SubjectView<'a> {
    fn new(timestamps: &'a [DateTime<Utc>], columns: Vec<&'a [i64]>) -> Self {
        let prefix = columns
            .iter()
            .map(|column| {
                let mut acc = Vec::with_capacity(column.len() + 1);
                acc.push(0);
                let mut total = 0;
                for value in *column {
                    total += value;
                    acc.push(total);
                }
                acc
            })
            .collect();
        Self {
            timestamps,
            columns,
            prefix,
        }
    }

    fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row counts at one row.
    fn row_counts(&self, row: usize) -> Vec<i64> {
        self.columns.iter().map(|column| column[row]).collect()
    }

    /// Cumulative sums over the first `rows` rows.
    fn prefix_at(&self, rows: usize) -> Vec<i64> {
        self.prefix.iter().map(|acc| acc[rows]).collect()
    }

    /// Number of rows at or before `instant`; with `inclusive` false the
    /// row at the instant itself is not counted.
    fn rows_through(&self, instant: DateTime<Utc>, inclusive: bool) -> usize {
        if inclusive {
            self.timestamps.partition_point(|t| *t <= instant)
        } else {
            self.timestamps.partition_point(|t| *t < instant)
        }
    }

    /// Column sums over the rows falling in `[lo, hi]`, with endpoint
    /// membership per the inclusivity flags.
    fn sum_range(
        &self,
        lo: DateTime<Utc>,
        hi: DateTime<Utc>,
        include_lo: bool,
        include_hi: bool,
    ) -> Vec<i64> {
        let start = self.rows_through(lo, !include_lo);
        let end = self.rows_through(hi, include_hi);
        if end <= start {
            return vec![0; self.n_columns()];
        }
        (0..self.n_columns())
            .map(|c| self.prefix[c][end] - self.prefix[c][start])
            .collect()
    }
}

fn group_anchors(anchors: &[Anchor]) -> Vec<(i64, Vec<Anchor>)> {
    let mut sorted = anchors.to_vec();
    sorted.sort();
    let mut grouped: Vec<(i64, Vec<Anchor>)> = Vec::new();
    for anchor in sorted {
        match grouped.last_mut() {
            Some((subject, group)) if *subject == anchor.subject_id => group.push(anchor),
            _ => grouped.push((anchor.subject_id, vec![anchor])),
        }
    }
    grouped
}

fn subject_view<'a>(frame: &'a PredicateFrame, subject_id: i64) -> Option<SubjectView<'a>> {
    let range = frame.group_range(subject_id)?;
    Some(SubjectView::new(
        &frame.timestamps()[range.clone()],
        frame.column_slices(range),
    ))
}

/// Rolling predicate-count sums over `[anchor + offset, anchor + offset +
/// window_size]` for every anchor. Anchors need not correspond to extant
/// rows; the aggregation is over a time range, not row identity. The
/// result stays keyed by the input anchor.
pub fn aggregate_temporal(
    frame: &PredicateFrame,
    bounds: &TemporalBounds,
    anchors: &[Anchor],
) -> Vec<WindowAggregate> {
    let closed = bounds.closed();
    group_anchors(anchors)
        .into_par_iter()
        .map(|(subject_id, group)| {
            let Some(view) = subject_view(frame, subject_id) else {
                return Vec::new();
            };
            group
                .into_iter()
                .map(|anchor| {
                    let (window_start, window_end) = bounds.window_edges(anchor.timestamp);
                    let (lo, hi) = bounds.chronological_span(anchor.timestamp);
                    let counts =
                        view.sum_range(lo, hi, closed.includes_left(), closed.includes_right());
                    WindowAggregate {
                        anchor,
                        window_start,
                        window_end,
                        counts,
                    }
                })
                .collect()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Rows eligible to terminate an event-bounded window for one subject.
fn bound_rows(view: &SubjectView<'_>, frame: &PredicateFrame, target: &BoundTarget) -> Vec<usize> {
    match target {
        BoundTarget::Predicate(name) => {
            let Some(idx) = frame.column_index(name) else {
                return Vec::new();
            };
            view.columns[idx]
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(row, _)| row)
                .collect()
        }
        BoundTarget::RecordStart => vec![0],
        BoundTarget::RecordEnd => vec![view.timestamps.len() - 1],
    }
}

/// Predicate-count sums between each anchor plus `bounds.offset` and the
/// nearest row on which the boundary predicate fires: the next such row
/// for forward windows, the previous one for backward windows.
///
/// A row whose timestamp ties the shifted anchor position can serve as the
/// bound only when the bound-side endpoint is inclusive (the end flag for
/// forward windows, the start flag for backward ones). Anchors with no
/// matching bound yield no output row; the realization is impossible.
///
/// Forward windows re-key the result to the matched bound row; backward
/// windows stay keyed at the anchor side.
pub fn aggregate_event_bound(
    frame: &PredicateFrame,
    bounds: &EventBounds,
    anchors: &[Anchor],
) -> Vec<WindowAggregate> {
    let closed = bounds.closed();
    group_anchors(anchors)
        .into_par_iter()
        .map(|(subject_id, group)| {
            let Some(view) = subject_view(frame, subject_id) else {
                return Vec::new();
            };
            if view.timestamps.is_empty() {
                return Vec::new();
            }
            let bound_at = bound_rows(&view, frame, &bounds.target);
            group
                .into_iter()
                .filter_map(|anchor| event_bound_one(&view, bounds, closed, &bound_at, anchor))
                .collect()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

fn event_bound_one(
    view: &SubjectView<'_>,
    bounds: &EventBounds,
    closed: Closed,
    bound_at: &[usize],
    anchor: Anchor,
) -> Option<WindowAggregate> {
    let zero = Duration::zero();
    let shifted = anchor.timestamp + bounds.offset;

    // Cumulative sums through the anchor row, and the anchor row's own
    // counts (zero when the anchor is not an extant row).
    let anchor_rows = view.rows_through(anchor.timestamp, true);
    let anchor_cum = view.prefix_at(anchor_rows);
    let anchor_counts = if anchor_rows > 0 && view.timestamps[anchor_rows - 1] == anchor.timestamp {
        view.row_counts(anchor_rows - 1)
    } else {
        vec![0; view.n_columns()]
    };

    match bounds.direction {
        BoundDirection::Forward => {
            let tie_eligible = closed.includes_right();
            let position = bound_at.partition_point(|&row| {
                let bound_ts = view.timestamps[row];
                if tie_eligible {
                    bound_ts < shifted
                } else {
                    bound_ts <= shifted
                }
            });
            let bound_row = *bound_at.get(position)?;
            let bound_ts = view.timestamps[bound_row];

            let mut bound_cum = view.prefix_at(bound_row + 1);
            if !closed.includes_right() {
                for (acc, count) in bound_cum.iter_mut().zip(view.row_counts(bound_row)) {
                    *acc -= count;
                }
            }

            let mut counts: Vec<i64> = bound_cum
                .iter()
                .zip(&anchor_cum)
                .map(|(b, a)| b - a)
                .collect();
            if (closed.includes_left() && bounds.offset <= zero) || bounds.offset < zero {
                for (acc, count) in counts.iter_mut().zip(&anchor_counts) {
                    *acc += count;
                }
            }
            if bounds.offset > zero {
                let stub =
                    view.sum_range(anchor.timestamp, shifted, false, !closed.includes_left());
                for (acc, count) in counts.iter_mut().zip(stub) {
                    *acc -= count;
                }
            } else if bounds.offset < zero {
                let stub =
                    view.sum_range(shifted, anchor.timestamp, closed.includes_left(), false);
                for (acc, count) in counts.iter_mut().zip(stub) {
                    *acc += count;
                }
            }

            Some(WindowAggregate {
                anchor,
                window_start: shifted,
                window_end: bound_ts,
                counts,
            })
        }
        BoundDirection::Backward => {
            let tie_eligible = closed.includes_left();
            let position = bound_at.partition_point(|&row| {
                let bound_ts = view.timestamps[row];
                if tie_eligible {
                    bound_ts <= shifted
                } else {
                    bound_ts < shifted
                }
            });
            let bound_row = *bound_at.get(position.checked_sub(1)?)?;
            let bound_ts = view.timestamps[bound_row];

            let mut bound_cum = view.prefix_at(bound_row + 1);
            if closed.includes_left() {
                for (acc, count) in bound_cum.iter_mut().zip(view.row_counts(bound_row)) {
                    *acc -= count;
                }
            }

            let mut counts: Vec<i64> = anchor_cum
                .iter()
                .zip(&bound_cum)
                .map(|(a, b)| a - b)
                .collect();
            if (!closed.includes_right() && bounds.offset <= zero) || bounds.offset < zero {
                for (acc, count) in counts.iter_mut().zip(&anchor_counts) {
                    *acc -= count;
                }
            }
            if bounds.offset > zero {
                let stub =
                    view.sum_range(anchor.timestamp, shifted, false, closed.includes_right());
                for (acc, count) in counts.iter_mut().zip(stub) {
                    *acc += count;
                }
            } else if bounds.offset < zero {
                let stub =
                    view.sum_range(shifted, anchor.timestamp, !closed.includes_right(), false);
                for (acc, count) in counts.iter_mut().zip(stub) {
                    *acc -= count;
                }
            }

            Some(WindowAggregate {
                anchor,
                window_start: bound_ts,
                window_end: shifted,
                counts,
            })
        }
    }
}
