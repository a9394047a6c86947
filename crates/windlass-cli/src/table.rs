//! CSV reading and writing for predicates frames and cohort tables.
//!
//! Input schema: `subject_id,timestamp,<predicate columns...>`. An empty
//! timestamp marks a static (demographic) row. Output flattens each window
//! struct into `<node>.start`, `<node>.end`, and `<node>.<predicate>`
//! columns.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use windlass_engine::{CohortTable, EventRow, PredicateFrame, SchemaError};

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot open '{path}': {message}")]
    Io { path: String, message: String },

    #[error("malformed CSV in '{path}': {message}")]
    Csv { path: String, message: String },

    #[error("'{path}' must start with 'subject_id,timestamp' columns")]
    Header { path: String },

    #[error("line {line} of '{path}': cannot parse '{value}' as {expected}")]
    Value {
        path: String,
        line: usize,
        value: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Read a predicates frame from CSV.
pub fn read_frame(path: impl AsRef<Path>) -> Result<PredicateFrame, TableError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let mut reader = csv::Reader::from_path(path).map_err(|e| TableError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let headers = reader
        .headers()
        .map_err(|e| TableError::Csv {
            path: display.clone(),
            message: e.to_string(),
        })?
        .clone();
    let mut columns = headers.iter();
    if columns.next() != Some("subject_id") || columns.next() != Some("timestamp") {
        return Err(TableError::Header { path: display });
    }
    let column_names: Vec<String> = columns.map(str::to_string).collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = record.map_err(|e| TableError::Csv {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let bad_value = |value: &str, expected: &'static str| TableError::Value {
            path: display.clone(),
            line,
            value: value.to_string(),
            expected,
        };

        let subject_field = record.get(0).unwrap_or_default();
        let subject_id: i64 = subject_field
            .trim()
            .parse()
            .map_err(|_| bad_value(subject_field, "a subject id"))?;

        let timestamp_field = record.get(1).unwrap_or_default().trim();
        let timestamp = if timestamp_field.is_empty() {
            None
        } else {
            Some(
                parse_timestamp(timestamp_field)
                    .ok_or_else(|| bad_value(timestamp_field, "a timestamp"))?,
            )
        };

        let mut counts = Vec::with_capacity(column_names.len());
        for position in 0..column_names.len() {
            let field = record.get(position + 2).unwrap_or_default().trim();
            let count: i64 = if field.is_empty() {
                0
            } else {
                field
                    .parse()
                    .map_err(|_| bad_value(field, "an integer count"))?
            };
            counts.push(count);
        }

        rows.push(EventRow {
            subject_id,
            timestamp,
            counts,
        });
    }

    Ok(PredicateFrame::new(column_names, rows)?)
}

/// Write a cohort table to CSV, flattening the per-node window structs.
pub fn write_table(path: impl AsRef<Path>, table: &CohortTable) -> Result<(), TableError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let mut writer = csv::Writer::from_path(path).map_err(|e| TableError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let csv_error = |e: csv::Error| TableError::Csv {
        path: display.clone(),
        message: e.to_string(),
    };

    let mut header: Vec<String> = vec!["subject_id".into()];
    if table.has_index_timestamp {
        header.push("index_timestamp".into());
    }
    if table.has_label {
        header.push("label".into());
    }
    header.push("trigger".into());
    for node in &table.node_names {
        header.push(format!("{node}.start"));
        header.push(format!("{node}.end"));
        for predicate in &table.predicate_columns {
            header.push(format!("{node}.{predicate}"));
        }
    }
    writer.write_record(&header).map_err(csv_error)?;

    for row in &table.rows {
        let mut record: Vec<String> = vec![row.subject_id.to_string()];
        if table.has_index_timestamp {
            record.push(row.index_timestamp.map(format_timestamp).unwrap_or_default());
        }
        if table.has_label {
            record.push(row.label.map(|l| l.to_string()).unwrap_or_default());
        }
        record.push(format_timestamp(row.trigger));
        for window in &row.windows {
            record.push(format_timestamp(window.start));
            record.push(format_timestamp(window.end));
            for count in &window.counts {
                record.push(count.to_string());
            }
        }
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| TableError::Io {
        path: display,
        message: e.to_string(),
    })
}
