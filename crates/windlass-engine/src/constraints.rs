//! Predicate-count constraint filtering.

use indexmap::IndexMap;
use tracing::debug;

use windlass_core::{CountBounds, ANY_EVENT_COLUMN};

use crate::aggregate::WindowAggregate;
use crate::error::{EngineError, EngineResult};
use crate::frame::PredicateFrame;

/// Keep only the aggregates whose predicate counts fall inside every
/// configured `(min, max)` interval. The `*` key aliases `_ANY_EVENT`.
pub fn filter_constraints(
    node: &str,
    constraints: &IndexMap<String, CountBounds>,
    frame: &PredicateFrame,
    mut aggregates: Vec<WindowAggregate>,
) -> EngineResult<Vec<WindowAggregate>> {
    if constraints.is_empty() {
        return Ok(aggregates);
    }

    let mut checks: Vec<(usize, CountBounds)> = Vec::with_capacity(constraints.len());
    for (predicate, bounds) in constraints {
        let column = if predicate == "*" {
            ANY_EVENT_COLUMN
        } else {
            predicate.as_str()
        };
        let idx = frame
            .column_index(column)
            .ok_or_else(|| EngineError::Extraction {
                node: node.to_string(),
                message: format!("constraint references missing column '{column}'"),
            })?;
        checks.push((idx, *bounds));
    }

    let before = aggregates.len();
    aggregates.retain(|aggregate| {
        checks
            .iter()
            .all(|(idx, bounds)| bounds.contains(aggregate.counts[*idx]))
    });
    debug!(
        "node '{node}': {} of {before} candidate windows satisfy constraints",
        aggregates.len()
    );
    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Anchor;
    use crate::frame::EventRow;
    use chrono::{TimeZone, Utc};

    fn frame() -> PredicateFrame {
        PredicateFrame::new(
            vec!["is_a".into(), ANY_EVENT_COLUMN.into()],
            vec![EventRow {
                subject_id: 1,
                timestamp: Some(Utc.with_ymd_and_hms(1989, 12, 1, 0, 0, 0).unwrap()),
                counts: vec![1, 1],
            }],
        )
        .unwrap()
    }

    fn aggregate(is_a: i64, any: i64) -> WindowAggregate {
        let timestamp = Utc.with_ymd_and_hms(1989, 12, 1, 0, 0, 0).unwrap();
        WindowAggregate {
            anchor: Anchor {
                subject_id: 1,
                timestamp,
            },
            window_start: timestamp,
            window_end: timestamp,
            counts: vec![is_a, any],
        }
    }

    #[test]
    fn test_bounds_filtering() {
        let constraints: IndexMap<String, CountBounds> =
            [("is_a".to_string(), CountBounds::new(Some(1), Some(2)).unwrap())]
                .into_iter()
                .collect();
        let kept = filter_constraints(
            "w.end",
            &constraints,
            &frame(),
            vec![aggregate(0, 5), aggregate(1, 5), aggregate(2, 5), aggregate(3, 5)],
        )
        .unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_star_aliases_any_event() {
        let constraints: IndexMap<String, CountBounds> =
            [("*".to_string(), CountBounds::new(Some(4), None).unwrap())]
                .into_iter()
                .collect();
        let kept = filter_constraints(
            "w.end",
            &constraints,
            &frame(),
            vec![aggregate(0, 3), aggregate(0, 4)],
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].counts[1], 4);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let constraints: IndexMap<String, CountBounds> =
            [("ghost".to_string(), CountBounds::new(Some(1), None).unwrap())]
                .into_iter()
                .collect();
        assert!(filter_constraints("w.end", &constraints, &frame(), vec![]).is_err());
    }
}
