//! Columnar predicates frame.
//!
//! Counts are stored one contiguous `Vec<i64>` per predicate so the
//! aggregation kernel runs over cache-friendly slices, with rows grouped by
//! subject and sorted by timestamp. Static rows (null timestamp) are held
//! aside for the demographics filter and never reach the extractor.

use std::ops::Range;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use windlass_core::{DerivedExpr, ANY_EVENT_COLUMN};

use crate::error::SchemaError;

/// One input row. A `None` timestamp marks a static (demographic) row.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub subject_id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub counts: Vec<i64>,
}

/// The predicates table: one row per `(subject_id, timestamp)` event with a
/// non-negative count column per predicate. Immutable during extraction.
#[derive(Debug, Clone)]
pub struct PredicateFrame {
    subjects: Vec<i64>,
    timestamps: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Vec<i64>>,
    groups: Vec<(i64, Range<usize>)>,
    statics: Vec<(i64, Vec<i64>)>,
}

impl PredicateFrame {
    /// Build a frame from rows. Rows are sorted by `(subject_id,
    /// timestamp)`; duplicates and negative counts are rejected.
    pub fn new(column_names: Vec<String>, rows: Vec<EventRow>) -> Result<Self, SchemaError> {
        if !column_names.iter().any(|c| c == ANY_EVENT_COLUMN) {
            return Err(SchemaError::MissingColumn(ANY_EVENT_COLUMN.to_string()));
        }
        for (idx, name) in column_names.iter().enumerate() {
            if column_names[..idx].contains(name) {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }

        let mut event_rows = Vec::with_capacity(rows.len());
        let mut statics = Vec::new();
        for row in rows {
            if row.counts.len() != column_names.len() {
                return Err(SchemaError::ColumnLength {
                    column: column_names
                        .get(row.counts.len())
                        .cloned()
                        .unwrap_or_default(),
                    expected: column_names.len(),
                    actual: row.counts.len(),
                });
            }
            if let Some((idx, value)) = row
                .counts
                .iter()
                .enumerate()
                .find(|(_, v)| **v < 0)
                .map(|(i, v)| (i, *v))
            {
                return Err(SchemaError::NegativeCount {
                    column: column_names[idx].clone(),
                    subject_id: row.subject_id,
                    value,
                });
            }
            match row.timestamp {
                Some(timestamp) => event_rows.push((row.subject_id, timestamp, row.counts)),
                None => statics.push((row.subject_id, row.counts)),
            }
        }

        event_rows.sort_by_key(|(subject, timestamp, _)| (*subject, *timestamp));
        for pair in event_rows.windows(2) {
            if pair[0].0 == pair[1].0 && pair[0].1 == pair[1].1 {
                return Err(SchemaError::DuplicateEvent {
                    subject_id: pair[0].0,
                    timestamp: pair[0].1,
                });
            }
        }

        let mut subjects = Vec::with_capacity(event_rows.len());
        let mut timestamps = Vec::with_capacity(event_rows.len());
        let mut columns: IndexMap<String, Vec<i64>> = column_names
            .into_iter()
            .map(|name| (name, Vec::with_capacity(event_rows.len())))
            .collect();
        for (subject, timestamp, counts) in event_rows {
            subjects.push(subject);
            timestamps.push(timestamp);
            for (column, value) in columns.values_mut().zip(counts) {
                column.push(value);
            }
        }

        let groups = build_groups(&subjects);
        Ok(Self {
            subjects,
            timestamps,
            columns,
            groups,
            statics,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subjects(&self) -> &[i64] {
        &self.subjects
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Predicate column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, name: &str) -> Option<&[i64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Per-subject contiguous row ranges, ordered by subject.
    pub fn groups(&self) -> &[(i64, Range<usize>)] {
        &self.groups
    }

    pub fn group_range(&self, subject_id: i64) -> Option<Range<usize>> {
        self.groups
            .binary_search_by_key(&subject_id, |(subject, _)| *subject)
            .ok()
            .map(|idx| self.groups[idx].1.clone())
    }

    /// Column slices in declaration order, restricted to a row range.
    pub fn column_slices(&self, range: Range<usize>) -> Vec<&[i64]> {
        self.columns
            .values()
            .map(|column| &column[range.clone()])
            .collect()
    }

    /// Add a derived count column (1 where the boolean combination of its
    /// operands holds) unless the ingestion already provided it.
    pub fn materialize_derived(&mut self, name: &str, expr: &DerivedExpr) -> Result<(), SchemaError> {
        if self.columns.contains_key(name) {
            return Ok(());
        }
        let operand_columns: Vec<&[i64]> = expr
            .operands()
            .iter()
            .map(|operand| {
                self.column(operand)
                    .ok_or_else(|| SchemaError::MissingColumn(operand.clone()))
            })
            .collect::<Result<_, _>>()?;

        let values: Vec<i64> = (0..self.n_rows())
            .map(|row| {
                let hit = match expr {
                    DerivedExpr::All(_) => operand_columns.iter().all(|col| col[row] > 0),
                    DerivedExpr::AnyOf(_) => operand_columns.iter().any(|col| col[row] > 0),
                };
                i64::from(hit)
            })
            .collect();
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Restrict the frame to subjects whose static rows satisfy every
    /// demographic predicate, then drop static rows and demographic
    /// columns. With no demographics configured this only clears the
    /// static rows, which the extractor never sees.
    pub fn apply_demographics(&mut self, demographics: &[String]) -> Result<(), SchemaError> {
        if !demographics.is_empty() {
            let mut demographic_indices = Vec::with_capacity(demographics.len());
            for name in demographics {
                let idx = self
                    .column_index(name)
                    .ok_or_else(|| SchemaError::MissingStaticPredicate(name.clone()))?;
                demographic_indices.push(idx);
            }

            let satisfied = |subject_id: i64| {
                demographic_indices.iter().all(|&idx| {
                    self.statics
                        .iter()
                        .any(|(subject, counts)| *subject == subject_id && counts[idx] > 0)
                })
            };

            let keep: Vec<bool> = self
                .subjects
                .iter()
                .map(|subject| satisfied(*subject))
                .collect();
            let dropped = keep.iter().filter(|k| !**k).count();
            if dropped > 0 {
                debug!("demographics filter drops {dropped} event rows");
            }
            self.retain_rows(&keep);
            for name in demographics {
                self.columns.shift_remove(name);
            }
        }
        self.statics.clear();
        Ok(())
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        let mut iter = keep.iter();
        self.subjects.retain(|_| *iter.next().unwrap_or(&false));
        let mut iter = keep.iter();
        self.timestamps.retain(|_| *iter.next().unwrap_or(&false));
        for column in self.columns.values_mut() {
            let mut iter = keep.iter();
            column.retain(|_| *iter.next().unwrap_or(&false));
        }
        self.groups = build_groups(&self.subjects);
    }
}

fn build_groups(subjects: &[i64]) -> Vec<(i64, Range<usize>)> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=subjects.len() {
        if i == subjects.len() || subjects[i] != subjects[start] {
            groups.push((subjects[start], start..i));
            start = i;
        }
    }
    groups
}
