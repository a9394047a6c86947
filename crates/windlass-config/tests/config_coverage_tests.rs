//! Whole-document compilation coverage.

use windlass_core::{ConfigError, Side};

use windlass_config::TaskConfig;

fn base_yaml(windows: &str) -> String {
    format!(
        r#"
predicates:
  admission: {{code: ADMISSION}}
  discharge: {{code: DISCHARGE}}
  death: {{code: DEATH}}
trigger: admission
windows:
{windows}
"#
    )
}

#[test]
fn compiles_three_window_mortality_shape() {
    let yaml = base_yaml(
        r#"
  input:
    start: NULL
    end: trigger + 24h
    start_inclusive: true
    end_inclusive: true
    has:
      _ANY_EVENT: "(5, None)"
    index_timestamp: end
  gap:
    start: input.end
    end: start + 48h
    start_inclusive: false
    end_inclusive: true
    has:
      admission: "(None, 0)"
  target:
    start: gap.end
    end: start -> discharge
    start_inclusive: false
    end_inclusive: true
    label: death
"#,
    );
    let config = TaskConfig::from_yaml(&yaml).unwrap();
    assert_eq!(
        config.tree().preorder_names(),
        vec!["input.end", "input.start", "gap.end", "target.end"]
    );
    assert_eq!(config.label_node().unwrap().1, "death");
    assert_eq!(config.index_node().unwrap(), ("input.start".to_string(), Side::End));
}

#[test]
fn window_tree_renders_nested_branches() {
    let yaml = base_yaml(
        r#"
  pre:
    start: end - 365d
    end: trigger
    start_inclusive: false
    end_inclusive: false
  post:
    start: trigger
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
"#,
    );
    let config = TaskConfig::from_yaml(&yaml).unwrap();
    let rendered = config.tree().to_string();
    assert!(rendered.contains("├── pre.start"));
    assert!(rendered.contains("└── post.end"));
}

#[test]
fn rejects_unknown_window_reference() {
    let yaml = base_yaml(
        r#"
  target:
    start: ghost.end
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::UnknownWindow { .. }
    ));
}

#[test]
fn rejects_window_reference_cycle() {
    let yaml = base_yaml(
        r#"
  a:
    start: b.end
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
  b:
    start: a.end
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::WindowReferenceCycle(_)
    ));
}

#[test]
fn rejects_both_null_boundaries() {
    let yaml = base_yaml(
        r#"
  whole_record:
    start: NULL
    end: NULL
    start_inclusive: true
    end_inclusive: true
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::BothEndsOpen { .. }
    ));
}

#[test]
fn rejects_backward_progress_from_anchor() {
    let yaml = base_yaml(
        r#"
  w:
    start: trigger
    end: start - 2h
    start_inclusive: false
    end_inclusive: true
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::WindowOrder { .. }
    ));
}

#[test]
fn rejects_bad_index_timestamp_value() {
    let yaml = base_yaml(
        r#"
  w:
    start: trigger
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
    index_timestamp: middle
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::InvalidIndexTimestamp { .. }
    ));
}

#[test]
fn rejects_unknown_label_predicate() {
    let yaml = base_yaml(
        r#"
  w:
    start: trigger
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
    label: recovery
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::UnknownPredicate { .. }
    ));
}

#[test]
fn rejects_malformed_derived_expression() {
    let yaml = r#"
predicates:
  a: {code: A}
  bad: {expr: "xor(a, a)"}
trigger: a
windows:
  w:
    start: trigger
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
"#;
    assert!(matches!(
        TaskConfig::from_yaml(yaml).unwrap_err(),
        ConfigError::InvalidDerivedExpr { .. }
    ));
}

#[test]
fn rejects_invalid_names() {
    let yaml = r#"
predicates:
  "bad name": {code: A}
trigger: bad name
windows:
  w:
    start: trigger
    end: start + 1d
    start_inclusive: false
    end_inclusive: true
"#;
    assert!(matches!(
        TaskConfig::from_yaml(yaml).unwrap_err(),
        ConfigError::InvalidPredicateName(_)
    ));
}

#[test]
fn rejects_malformed_duration() {
    let yaml = base_yaml(
        r#"
  w:
    start: trigger
    end: start + 2 fortnights
    start_inclusive: false
    end_inclusive: true
"#,
    );
    assert!(matches!(
        TaskConfig::from_yaml(&yaml).unwrap_err(),
        ConfigError::InvalidDuration { .. }
    ));
}

#[test]
fn record_edge_predicates_do_not_need_definitions() {
    let yaml = base_yaml(
        r#"
  history:
    start: NULL
    end: trigger
    start_inclusive: true
    end_inclusive: true
    has:
      "*": "(1, None)"
"#,
    );
    let config = TaskConfig::from_yaml(&yaml).unwrap();
    assert_eq!(config.tree().preorder_names(), vec!["history.start"]);
}
