//! Whole-document compilation into an immutable [`TaskConfig`].

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use windlass_core::predicate::is_valid_name;
use windlass_core::{
    derived_evaluation_order, ConfigError, ConfigResult, DerivedExpr, DerivedPredicate,
    PlainPredicate, PredicateDef, Side,
};

use crate::schema::{self, RawDocument, RawOverlay, RawPlainPredicate, RawPredicate};
use crate::tree::WindowTree;
use crate::window::WindowConfig;

/// A fully validated task configuration. Immutable after compilation; the
/// engine takes it by reference.
#[derive(Debug)]
pub struct TaskConfig {
    predicates: IndexMap<String, PredicateDef>,
    trigger: String,
    windows: IndexMap<String, WindowConfig>,
    tree: WindowTree,
    derived_order: Vec<String>,
    label_window: Option<String>,
    index_window: Option<String>,
}

fn read_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn plain_from_raw(raw: &RawPlainPredicate, force_static: bool) -> PlainPredicate {
    let stringify = |value: &serde_yaml::Value| match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    };
    PlainPredicate {
        code: raw.code.clone(),
        value_min: raw.value_min,
        value_max: raw.value_max,
        value_min_inclusive: raw.value_min_inclusive,
        value_max_inclusive: raw.value_max_inclusive,
        other_cols: raw
            .other_cols
            .iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect(),
        is_static: force_static || raw.is_static,
    }
}

impl TaskConfig {
    /// Load and compile a task configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_with_overlay(path, Option::<&Path>::None)
    }

    /// Load a task configuration, optionally merging a predicates-only
    /// overlay file over its `predicates`/`patient_demographics` blocks.
    pub fn load_with_overlay(
        path: impl AsRef<Path>,
        overlay: Option<impl AsRef<Path>>,
    ) -> ConfigResult<Self> {
        let document = read_file(path.as_ref())?;
        let overlay_text = overlay.map(|p| read_file(p.as_ref())).transpose()?;
        Self::from_yaml_with_overlay(&document, overlay_text.as_deref())
    }

    /// Compile a task configuration from YAML text.
    pub fn from_yaml(document: &str) -> ConfigResult<Self> {
        Self::from_yaml_with_overlay(document, None)
    }

    pub fn from_yaml_with_overlay(document: &str, overlay: Option<&str>) -> ConfigResult<Self> {
        let mut raw = schema::parse_document(document)?;
        if let Some(overlay_text) = overlay {
            let overlay = schema::parse_overlay(overlay_text)?;
            merge_overlay(&mut raw, overlay);
        }
        Self::compile(raw)
    }

    fn compile(raw: RawDocument) -> ConfigResult<Self> {
        info!("parsing predicates...");
        let mut predicates: IndexMap<String, PredicateDef> = IndexMap::new();
        for (name, predicate) in &raw.predicates {
            if !is_valid_name(name) {
                return Err(ConfigError::InvalidPredicateName(name.clone()));
            }
            let def = match predicate {
                RawPredicate::Plain(plain) => PredicateDef::Plain(plain_from_raw(plain, false)),
                RawPredicate::Derived(derived) => PredicateDef::Derived(DerivedPredicate {
                    expr: DerivedExpr::parse(&derived.expr)?,
                }),
            };
            predicates.insert(name.clone(), def);
        }
        for (name, demographic) in &raw.patient_demographics {
            if !is_valid_name(name) {
                return Err(ConfigError::InvalidPredicateName(name.clone()));
            }
            if predicates
                .insert(
                    name.clone(),
                    PredicateDef::Plain(plain_from_raw(demographic, true)),
                )
                .is_some()
            {
                return Err(ConfigError::DuplicatePredicate { name: name.clone() });
            }
        }
        if predicates.is_empty() {
            return Err(ConfigError::EmptyPredicates);
        }

        let derived_order = derived_evaluation_order(&predicates)?;

        info!("parsing trigger event...");
        let trigger = raw.trigger.clone().ok_or(ConfigError::MissingTrigger)?;
        if !predicates.contains_key(&trigger) && !windlass_core::is_special_column(&trigger) {
            return Err(ConfigError::UnknownPredicate {
                name: trigger.clone(),
                referenced_by: "trigger".to_string(),
            });
        }

        info!("parsing windows...");
        if raw.windows.is_empty() {
            return Err(ConfigError::EmptyWindows);
        }
        let mut windows: IndexMap<String, WindowConfig> = IndexMap::new();
        for (name, raw_window) in &raw.windows {
            windows.insert(name.clone(), WindowConfig::new(name, raw_window)?);
        }

        for window in windows.values() {
            for predicate in window.referenced_predicates() {
                if !predicates.contains_key(&predicate) {
                    return Err(ConfigError::UnknownPredicate {
                        name: predicate,
                        referenced_by: window.name.clone(),
                    });
                }
            }
        }

        let labeled: Vec<String> = windows
            .values()
            .filter(|w| w.label.is_some())
            .map(|w| w.name.clone())
            .collect();
        if labeled.len() > 1 {
            return Err(ConfigError::MultipleLabels(labeled.join(", ")));
        }
        let indexed: Vec<String> = windows
            .values()
            .filter(|w| w.index_timestamp.is_some())
            .map(|w| w.name.clone())
            .collect();
        if indexed.len() > 1 {
            return Err(ConfigError::MultipleIndexTimestamps(indexed.join(", ")));
        }

        let tree = WindowTree::build(&windows)?;
        debug!("window tree:\n{tree}");

        Ok(Self {
            predicates,
            trigger,
            windows,
            tree,
            derived_order,
            label_window: labeled.into_iter().next(),
            index_window: indexed.into_iter().next(),
        })
    }

    pub fn predicates(&self) -> &IndexMap<String, PredicateDef> {
        &self.predicates
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn windows(&self) -> &IndexMap<String, WindowConfig> {
        &self.windows
    }

    pub fn tree(&self) -> &WindowTree {
        &self.tree
    }

    /// Derived predicate names in an order where operands precede their
    /// dependents.
    pub fn derived_order(&self) -> &[String] {
        &self.derived_order
    }

    pub fn label_window(&self) -> Option<&str> {
        self.label_window.as_deref()
    }

    pub fn index_window(&self) -> Option<&str> {
        self.index_window.as_deref()
    }

    /// Names of static demographic predicates.
    pub fn demographic_names(&self) -> Vec<String> {
        self.predicates
            .iter()
            .filter(|(_, def)| def.is_static())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Predicate names the frame must carry as count columns (everything
    /// that is not static).
    pub fn event_predicate_names(&self) -> Vec<String> {
        self.predicates
            .iter()
            .filter(|(_, def)| !def.is_static())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The tree node holding the labeling window's content, with the label
    /// predicate name.
    pub fn label_node(&self) -> Option<(String, String)> {
        let window_name = self.label_window.as_deref()?;
        let window = self.windows.get(window_name)?;
        let label = window.label.clone()?;
        Some((
            format!("{window_name}.{}", window.constrained_side()),
            label,
        ))
    }

    /// The tree node holding the index window's content, with which of its
    /// boundary timestamps indexes the result.
    pub fn index_node(&self) -> Option<(String, Side)> {
        let window_name = self.index_window.as_deref()?;
        let window = self.windows.get(window_name)?;
        let side = window.index_timestamp?;
        Some((
            format!("{window_name}.{}", window.constrained_side()),
            side,
        ))
    }
}

fn merge_overlay(raw: &mut RawDocument, overlay: RawOverlay) {
    for (name, predicate) in overlay.predicates {
        raw.predicates.insert(name, predicate);
    }
    for (name, demographic) in overlay.patient_demographics {
        raw.patient_demographics.insert(name, demographic);
    }
}
