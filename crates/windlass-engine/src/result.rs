//! Result shaping.
//!
//! Flattens raw realizations into the cohort table: one row per
//! realization with the trigger timestamp, the optional label and index
//! columns, and one window snapshot per tree node in pre-order.

use chrono::{DateTime, Utc};

use windlass_config::TaskConfig;
use windlass_core::Side;

use crate::aggregate::Anchor;
use crate::error::{EngineError, EngineResult};
use crate::extract::{Realization, WindowSnapshot};
use crate::frame::PredicateFrame;

/// One realization, shaped for output.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortRow {
    pub subject_id: i64,
    pub index_timestamp: Option<DateTime<Utc>>,
    pub label: Option<i64>,
    pub trigger: DateTime<Utc>,
    /// One snapshot per tree node, parallel to
    /// [`CohortTable::node_names`].
    pub windows: Vec<WindowSnapshot>,
}

/// The final per-realization table.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortTable {
    /// Predicate count columns, in frame order, as carried by every
    /// window snapshot.
    pub predicate_columns: Vec<String>,
    /// Tree node names in pre-order; each row holds one snapshot per
    /// name.
    pub node_names: Vec<String>,
    pub has_label: bool,
    pub has_index_timestamp: bool,
    pub rows: Vec<CohortRow>,
}

impl CohortTable {
    pub fn empty(config: &TaskConfig, frame: &PredicateFrame) -> Self {
        Self {
            predicate_columns: frame.column_names(),
            node_names: config.tree().preorder_names(),
            has_label: config.label_window().is_some(),
            has_index_timestamp: config.index_window().is_some(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn missing_node(node: &str, anchor: Anchor) -> EngineError {
    EngineError::Extraction {
        node: node.to_string(),
        message: format!(
            "realization for subject {} at {} lost its window snapshot",
            anchor.subject_id, anchor.timestamp
        ),
    }
}

/// Shape extracted realizations into the final table.
pub fn shape_result(
    config: &TaskConfig,
    frame: &PredicateFrame,
    realizations: Vec<Realization>,
) -> EngineResult<CohortTable> {
    let node_names = config.tree().preorder_names();

    let label_source = match config.label_node() {
        Some((node, predicate)) => {
            let column = frame
                .column_index(&predicate)
                .ok_or(EngineError::Extraction {
                    node: node.clone(),
                    message: format!("label predicate '{predicate}' has no count column"),
                })?;
            Some((node, column))
        }
        None => None,
    };
    let index_source = config.index_node();

    let mut rows = Vec::with_capacity(realizations.len());
    for realization in realizations {
        let anchor = realization.anchor;

        let label = match &label_source {
            Some((node, column)) => Some(
                realization
                    .windows
                    .get(node)
                    .ok_or_else(|| missing_node(node, anchor))?
                    .counts[*column],
            ),
            None => None,
        };

        let index_timestamp = match &index_source {
            Some((node, side)) => {
                let snapshot = realization
                    .windows
                    .get(node)
                    .ok_or_else(|| missing_node(node, anchor))?;
                Some(match side {
                    Side::Start => snapshot.start,
                    Side::End => snapshot.end,
                })
            }
            None => None,
        };

        let windows = node_names
            .iter()
            .map(|node| {
                realization
                    .windows
                    .get(node)
                    .cloned()
                    .ok_or_else(|| missing_node(node, anchor))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        rows.push(CohortRow {
            subject_id: anchor.subject_id,
            index_timestamp,
            label,
            trigger: anchor.timestamp,
            windows,
        });
    }

    rows.sort_by_key(|row| (row.subject_id, row.index_timestamp.unwrap_or(row.trigger), row.trigger));

    Ok(CohortTable {
        predicate_columns: frame.column_names(),
        node_names,
        has_label: label_source.is_some(),
        has_index_timestamp: index_source.is_some(),
        rows,
    })
}
