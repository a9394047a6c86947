//! Top-level query entry point.

use tracing::{info, warn};

use windlass_config::TaskConfig;
use windlass_core::{PredicateDef, RECORD_END_COLUMN, RECORD_START_COLUMN};

use crate::aggregate::Anchor;
use crate::error::{EngineResult, SchemaError};
use crate::extract::extract_tree;
use crate::frame::PredicateFrame;
use crate::result::{shape_result, CohortTable};

/// Rows on which the trigger predicate fires, as prospective root anchors.
fn trigger_anchors(frame: &PredicateFrame, trigger: &str) -> EngineResult<Vec<Anchor>> {
    let row_anchor = |row: usize| Anchor {
        subject_id: frame.subjects()[row],
        timestamp: frame.timestamps()[row],
    };

    match trigger {
        RECORD_START_COLUMN => Ok(frame
            .groups()
            .iter()
            .map(|(_, range)| row_anchor(range.start))
            .collect()),
        RECORD_END_COLUMN => Ok(frame
            .groups()
            .iter()
            .map(|(_, range)| row_anchor(range.end - 1))
            .collect()),
        column => {
            let counts = frame
                .column(column)
                .ok_or_else(|| SchemaError::MissingColumn(column.to_string()))?;
            Ok(counts
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(row, _)| row_anchor(row))
                .collect())
        }
    }
}

/// Run a compiled task over a predicates frame.
///
/// The frame is consumed: the demographics filter and derived-predicate
/// materialization run first, then the trigger filter seeds the recursive
/// extraction and the result is shaped into the cohort table. An empty
/// frame or a trigger matching no rows yields an empty table, not an
/// error.
pub fn query(config: &TaskConfig, mut frame: PredicateFrame) -> EngineResult<CohortTable> {
    let demographics = config.demographic_names();
    if !demographics.is_empty() {
        info!("filtering subjects on {} static predicates...", demographics.len());
    }
    frame.apply_demographics(&demographics)?;

    for name in config.derived_order() {
        if let Some(PredicateDef::Derived(derived)) = config.predicates().get(name) {
            frame.materialize_derived(name, &derived.expr)?;
        }
    }
    for (name, def) in config.predicates() {
        if matches!(def, PredicateDef::Plain(p) if !p.is_static) && frame.column(name).is_none() {
            return Err(SchemaError::MissingColumn(name.clone()).into());
        }
    }

    info!("window tree:\n{}", config.tree());

    if frame.is_empty() {
        warn!("predicates table is empty; returning an empty result");
        return Ok(CohortTable::empty(config, &frame));
    }

    info!("identifying prospective trigger rows for '{}'...", config.trigger());
    let anchors = trigger_anchors(&frame, config.trigger())?;
    if anchors.is_empty() {
        warn!(
            "no rows match the trigger predicate '{}'; returning an empty result",
            config.trigger()
        );
        return Ok(CohortTable::empty(config, &frame));
    }

    info!("beginning extraction over {} trigger rows...", anchors.len());
    let realizations = extract_tree(config.tree(), &frame, anchors)?;
    let table = shape_result(config, &frame, realizations)?;
    if table.is_empty() {
        info!("no valid realizations found");
    } else {
        let mut subjects: Vec<i64> = table.rows.iter().map(|r| r.subject_id).collect();
        subjects.dedup();
        info!(
            "done: {} realizations across {} subjects",
            table.rows.len(),
            subjects.len()
        );
    }
    Ok(table)
}
