//! End-to-end cohort extraction scenarios.

use chrono::{DateTime, Duration, TimeZone, Utc};

use windlass_config::TaskConfig;
use windlass_engine::{query, CohortTable, EventRow, PredicateFrame};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1989, 12, 1, 12, 0, 0).unwrap()
}

/// Build a frame over the given predicate columns; `_ANY_EVENT` is
/// appended automatically.
fn frame(columns: &[&str], rows: &[(i64, DateTime<Utc>, &[(&str, i64)])]) -> PredicateFrame {
    let mut names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    names.push("_ANY_EVENT".to_string());
    let rows = rows
        .iter()
        .map(|(subject_id, timestamp, firing)| {
            let mut counts = vec![0; names.len()];
            *counts.last_mut().unwrap() = 1;
            for (name, count) in *firing {
                let idx = names.iter().position(|n| n == name).unwrap();
                counts[idx] = *count;
            }
            EventRow {
                subject_id: *subject_id,
                timestamp: Some(*timestamp),
                counts,
            }
        })
        .collect();
    PredicateFrame::new(names, rows).unwrap()
}

fn run(yaml: &str, frame: PredicateFrame) -> CohortTable {
    let config = TaskConfig::from_yaml(yaml).unwrap();
    query(&config, frame).unwrap()
}

fn node_snapshot<'a>(
    table: &'a CohortTable,
    row: usize,
    node: &str,
) -> &'a windlass_engine::WindowSnapshot {
    let idx = table.node_names.iter().position(|n| n == node).unwrap();
    &table.rows[row].windows[idx]
}

const MORTALITY_YAML: &str = r#"
predicates:
  admission: {code: ADMISSION}
  discharge: {code: DISCHARGE}
  death: {code: DEATH}
  discharge_or_death: {expr: "or(discharge, death)"}
trigger: admission
windows:
  input:
    start: NULL
    end: trigger + 24h
    start_inclusive: true
    end_inclusive: true
    has:
      _ANY_EVENT: "(5, None)"
    index_timestamp: end
  target:
    start: input.end
    end: start -> discharge_or_death
    start_inclusive: false
    end_inclusive: true
    label: death
"#;

#[test]
fn scenario_a_sparse_history_fails_input_constraint() {
    let columns = ["admission", "discharge", "death"];
    let table = run(
        MORTALITY_YAML,
        frame(
            &columns,
            &[
                (1, t0(), &[("admission", 1)]),
                (1, t0() + Duration::hours(12), &[]),
                (1, t0() + Duration::hours(30), &[]),
                (1, t0() + Duration::hours(72), &[("death", 1)]),
            ],
        ),
    );
    assert!(table.is_empty());
}

#[test]
fn scenario_a_dense_history_labels_mortality() {
    let columns = ["admission", "discharge", "death"];
    let table = run(
        MORTALITY_YAML,
        frame(
            &columns,
            &[
                (1, t0(), &[("admission", 1)]),
                (1, t0() + Duration::hours(6), &[]),
                (1, t0() + Duration::hours(12), &[]),
                (1, t0() + Duration::hours(18), &[]),
                (1, t0() + Duration::hours(24), &[]),
                (1, t0() + Duration::hours(72), &[("death", 1)]),
            ],
        ),
    );

    assert_eq!(table.rows.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.subject_id, 1);
    assert_eq!(row.trigger, t0());
    assert_eq!(row.label, Some(1));
    assert_eq!(row.index_timestamp, Some(t0() + Duration::hours(24)));

    let target = node_snapshot(&table, 0, "target.end");
    assert_eq!(target.end, t0() + Duration::hours(72));

    let input = node_snapshot(&table, 0, "input.start");
    assert_eq!(input.start, t0());
    assert_eq!(input.end, t0() + Duration::hours(24));
    let any_idx = table
        .predicate_columns
        .iter()
        .position(|c| c == "_ANY_EVENT")
        .unwrap();
    assert_eq!(input.counts[any_idx], 5);
}

const IMMINENT_MORTALITY_YAML: &str = r#"
predicates:
  admission: {code: ADMISSION}
  death: {code: DEATH}
trigger: admission
windows:
  gap:
    start: trigger
    end: start + 2h
    start_inclusive: false
    end_inclusive: true
    has:
      death: "(None, 0)"
    index_timestamp: end
  target:
    start: gap.end
    end: start + 24h
    start_inclusive: false
    end_inclusive: true
    label: death
"#;

#[test]
fn scenario_b_imminent_mortality() {
    let table = run(
        IMMINENT_MORTALITY_YAML,
        frame(
            &["admission", "death"],
            &[
                (2, t0(), &[("admission", 1)]),
                (2, t0() + Duration::hours(10), &[("death", 1)]),
            ],
        ),
    );

    assert_eq!(table.rows.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.index_timestamp, Some(t0() + Duration::hours(2)));
    assert_eq!(row.label, Some(1));
}

#[test]
fn scenario_b_death_inside_gap_disqualifies() {
    let table = run(
        IMMINENT_MORTALITY_YAML,
        frame(
            &["admission", "death"],
            &[
                (2, t0(), &[("admission", 1)]),
                (2, t0() + Duration::hours(1), &[("death", 1)]),
            ],
        ),
    );
    assert!(table.is_empty());
}

#[test]
fn scenario_c_abnormal_spo2() {
    let yaml = r#"
predicates:
  normal_spo2: {code: SPO2//normal}
  abnormal_spo2: {code: SPO2//abnormal, value_max: 90}
  spo2: {expr: "or(normal_spo2, abnormal_spo2)"}
trigger: normal_spo2
windows:
  gap:
    start: trigger
    end: start + 24h
    start_inclusive: false
    end_inclusive: true
    has:
      abnormal_spo2: "(None, 0)"
  target:
    start: gap.end
    end: start + 7d
    start_inclusive: false
    end_inclusive: true
    has:
      spo2: "(1, None)"
    label: abnormal_spo2
"#;
    let table = run(
        yaml,
        frame(
            &["normal_spo2", "abnormal_spo2"],
            &[
                (7, t0(), &[("normal_spo2", 1)]),
                (7, t0() + Duration::days(3), &[("abnormal_spo2", 1)]),
            ],
        ),
    );

    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].label, Some(1));
    let target = node_snapshot(&table, 0, "target.end");
    let spo2_idx = table
        .predicate_columns
        .iter()
        .position(|c| c == "spo2")
        .unwrap();
    assert_eq!(target.counts[spo2_idx], 1);
}

#[test]
fn scenario_d_empty_trigger_returns_empty_table() {
    let table = run(
        IMMINENT_MORTALITY_YAML,
        frame(
            &["admission", "death"],
            &[
                (3, t0(), &[("death", 1)]),
                (3, t0() + Duration::hours(4), &[]),
            ],
        ),
    );
    assert!(table.is_empty());
    assert_eq!(table.node_names, vec!["gap.end", "target.end"]);
}

#[test]
fn scenario_d_empty_frame_returns_empty_table() {
    let table = run(IMMINENT_MORTALITY_YAML, frame(&["admission", "death"], &[]));
    assert!(table.is_empty());
}

const TIE_YAML: &str = r#"
predicates:
  admission: {code: ADMISSION}
  lab: {code: LAB}
trigger: admission
windows:
  lookback:
    start: end <- lab
    end: trigger
    start_inclusive: false
    end_inclusive: true
"#;

#[test]
fn scenario_e_tied_bound_with_exclusive_start_is_discarded() {
    // The trigger row itself satisfies the bound predicate; with an
    // exclusive start it cannot terminate its own lookback window, and no
    // earlier lab event exists.
    let table = run(
        TIE_YAML,
        frame(
            &["admission", "lab"],
            &[(1, t0(), &[("admission", 1), ("lab", 1)])],
        ),
    );
    assert!(table.is_empty());
}

#[test]
fn scenario_e_tied_bound_reaches_earlier_event() {
    let table = run(
        TIE_YAML,
        frame(
            &["admission", "lab"],
            &[
                (1, t0() - Duration::days(2), &[("lab", 1)]),
                (1, t0(), &[("admission", 1), ("lab", 1)]),
            ],
        ),
    );
    assert_eq!(table.rows.len(), 1);
    let lookback = node_snapshot(&table, 0, "lookback.start");
    assert_eq!(lookback.start, t0() - Duration::days(2));
    assert_eq!(lookback.end, t0());
}

#[test]
fn scenario_e_inclusive_start_accepts_zero_length_window() {
    let inclusive = TIE_YAML.replace("start_inclusive: false", "start_inclusive: true");
    let table = run(
        &inclusive,
        frame(
            &["admission", "lab"],
            &[(1, t0(), &[("admission", 1), ("lab", 1)])],
        ),
    );
    assert_eq!(table.rows.len(), 1);
    let lookback = node_snapshot(&table, 0, "lookback.start");
    assert_eq!(lookback.start, t0());
    assert_eq!(lookback.end, t0());
}

#[test]
fn scenario_f_sibling_windows_intersect() {
    let yaml = r#"
predicates:
  admission: {code: ADMISSION}
  discharge: {code: DISCHARGE}
  death: {code: DEATH}
trigger: admission
windows:
  history:
    start: end - 24h
    end: trigger
    start_inclusive: true
    end_inclusive: false
    has:
      death: "(1, None)"
  followup:
    start: trigger
    end: start + 24h
    start_inclusive: false
    end_inclusive: true
    has:
      discharge: "(1, None)"
"#;
    // Subject 1 satisfies only the followup branch; subject 2 both.
    let table = run(
        yaml,
        frame(
            &["admission", "discharge", "death"],
            &[
                (1, t0(), &[("admission", 1)]),
                (1, t0() + Duration::hours(6), &[("discharge", 1)]),
                (2, t0(), &[("death", 1)]),
                (2, t0() + Duration::hours(6), &[("admission", 1)]),
                (2, t0() + Duration::hours(12), &[("discharge", 1)]),
            ],
        ),
    );
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].subject_id, 2);
}

#[test]
fn null_end_window_spans_to_last_event() {
    let yaml = r#"
predicates:
  admission: {code: ADMISSION}
  death: {code: DEATH}
trigger: admission
windows:
  followup:
    start: trigger
    end: NULL
    start_inclusive: false
    end_inclusive: true
"#;
    let last = t0() + Duration::days(9);
    let table = run(
        yaml,
        frame(
            &["admission", "death"],
            &[
                (1, t0(), &[("admission", 1)]),
                (1, t0() + Duration::days(2), &[]),
                (1, last, &[("death", 1)]),
            ],
        ),
    );
    assert_eq!(table.rows.len(), 1);
    let followup = node_snapshot(&table, 0, "followup.end");
    assert_eq!(followup.start, t0());
    assert_eq!(followup.end, last);
    let death_idx = table
        .predicate_columns
        .iter()
        .position(|c| c == "death")
        .unwrap();
    assert_eq!(followup.counts[death_idx], 1);
}

#[test]
fn exclusive_start_does_not_collapse_forward_event_window() {
    // The trigger row itself fires the bound predicate; the window must
    // run to the next firing rather than collapse to zero length.
    let yaml = r#"
predicates:
  admission: {code: ADMISSION}
  lab: {code: LAB}
trigger: admission
windows:
  until_lab:
    start: trigger
    end: start -> lab
    start_inclusive: false
    end_inclusive: false
"#;
    let table = run(
        yaml,
        frame(
            &["admission", "lab"],
            &[
                (1, t0(), &[("admission", 1), ("lab", 1)]),
                (1, t0() + Duration::hours(8), &[]),
                (1, t0() + Duration::hours(16), &[("lab", 1)]),
            ],
        ),
    );
    assert_eq!(table.rows.len(), 1);
    let window = node_snapshot(&table, 0, "until_lab.end");
    assert_eq!(window.start, t0());
    assert_eq!(window.end, t0() + Duration::hours(16));
    let any_idx = table
        .predicate_columns
        .iter()
        .position(|c| c == "_ANY_EVENT")
        .unwrap();
    // Exclusive on both ends: only the middle event is counted.
    assert_eq!(window.counts[any_idx], 1);
}

#[test]
fn event_exactly_at_temporal_endpoint_follows_inclusivity() {
    let yaml = r#"
predicates:
  admission: {code: ADMISSION}
  death: {code: DEATH}
trigger: admission
windows:
  day:
    start: trigger
    end: start + 24h
    start_inclusive: false
    end_inclusive: INCLUSIVITY
    has:
      death: "(1, None)"
"#;
    let rows_frame = || {
        frame(
            &["admission", "death"],
            &[
                (1, t0(), &[("admission", 1)]),
                (1, t0() + Duration::hours(24), &[("death", 1)]),
            ],
        )
    };
    let inclusive = run(&yaml.replace("INCLUSIVITY", "true"), rows_frame());
    assert_eq!(inclusive.rows.len(), 1);

    let exclusive = run(&yaml.replace("INCLUSIVITY", "false"), rows_frame());
    assert!(exclusive.is_empty());
}

#[test]
fn demographics_restrict_cohort() {
    let yaml = r#"
predicates:
  admission: {code: ADMISSION}
  death: {code: DEATH}
patient_demographics:
  male: {code: SEX//male}
trigger: admission
windows:
  followup:
    start: trigger
    end: start + 24h
    start_inclusive: false
    end_inclusive: true
"#;
    let names: Vec<String> = vec![
        "admission".into(),
        "death".into(),
        "_ANY_EVENT".into(),
        "male".into(),
    ];
    let event = |subject: i64, timestamp, admission: i64| EventRow {
        subject_id: subject,
        timestamp: Some(timestamp),
        counts: vec![admission, 0, 1, 0],
    };
    let static_row = |subject: i64, male: i64| EventRow {
        subject_id: subject,
        timestamp: None,
        counts: vec![0, 0, 0, male],
    };
    let frame = PredicateFrame::new(
        names,
        vec![
            static_row(1, 1),
            event(1, t0(), 1),
            static_row(2, 0),
            event(2, t0(), 1),
        ],
    )
    .unwrap();

    let config = TaskConfig::from_yaml(yaml).unwrap();
    let table = query(&config, frame).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].subject_id, 1);
    assert!(!table.predicate_columns.iter().any(|c| c == "male"));
}

#[test]
fn result_rows_sorted_by_subject_and_index() {
    let table = run(
        IMMINENT_MORTALITY_YAML,
        frame(
            &["admission", "death"],
            &[
                (5, t0() + Duration::days(1), &[("admission", 1)]),
                (5, t0() + Duration::days(1) + Duration::hours(10), &[("death", 1)]),
                (2, t0(), &[("admission", 1)]),
                (2, t0() + Duration::hours(10), &[("death", 1)]),
            ],
        ),
    );
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].subject_id, 2);
    assert_eq!(table.rows[1].subject_id, 5);
    assert!(table.rows[0].index_timestamp < table.rows[1].index_timestamp);
}
