//! Raw serde model of the YAML task document.
//!
//! This layer only mirrors the on-disk shape; all semantic validation
//! happens when the raw document is compiled into a [`crate::TaskConfig`].
//! Unknown keys are rejected at every level.

use indexmap::IndexMap;
use serde::Deserialize;

use windlass_core::{ConfigError, ConfigResult, PredicateCode};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDocument {
    /// Free-form, ignored beyond parsing.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form, ignored beyond parsing.
    #[serde(default)]
    pub metadata: Option<serde_yaml::Value>,
    #[serde(default)]
    pub predicates: IndexMap<String, RawPredicate>,
    #[serde(default)]
    pub patient_demographics: IndexMap<String, RawPlainPredicate>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub windows: IndexMap<String, RawWindow>,
}

/// A predicates-only overlay document, merged over the main document's
/// `predicates` and `patient_demographics` blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOverlay {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_yaml::Value>,
    #[serde(default)]
    pub predicates: IndexMap<String, RawPredicate>,
    #[serde(default)]
    pub patient_demographics: IndexMap<String, RawPlainPredicate>,
}

/// Plain and derived predicates share a YAML namespace; a mapping with an
/// `expr` key is derived, one with a `code` key is plain.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPredicate {
    Derived(RawDerivedPredicate),
    Plain(RawPlainPredicate),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDerivedPredicate {
    pub expr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPlainPredicate {
    pub code: PredicateCode,
    #[serde(default)]
    pub value_min: Option<f64>,
    #[serde(default)]
    pub value_max: Option<f64>,
    #[serde(default)]
    pub value_min_inclusive: Option<bool>,
    #[serde(default)]
    pub value_max_inclusive: Option<bool>,
    #[serde(default)]
    pub other_cols: IndexMap<String, serde_yaml::Value>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWindow {
    /// `NULL` (or absent) means the window opens at the start of the
    /// subject's record.
    #[serde(default)]
    pub start: Option<String>,
    /// `NULL` (or absent) means the window closes at the end of the
    /// subject's record.
    #[serde(default)]
    pub end: Option<String>,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
    #[serde(default)]
    pub has: IndexMap<String, String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub index_timestamp: Option<String>,
}

pub fn parse_document(text: &str) -> ConfigResult<RawDocument> {
    serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))
}

pub fn parse_overlay(text: &str) -> ConfigResult<RawOverlay> {
    serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))
}
