//! Predicate definitions.
//!
//! Plain predicates describe how a count column is produced from raw event
//! data; that production happens in an ingestion collaborator, so the
//! engine only consumes the names. Derived predicates combine previously
//! defined predicates with a flat `and(...)`/`or(...)` expression.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Count column that is 1 on every event row.
pub const ANY_EVENT_COLUMN: &str = "_ANY_EVENT";
/// Marker for the chronologically first row per subject.
pub const RECORD_START_COLUMN: &str = "_RECORD_START";
/// Marker for the chronologically last row per subject.
pub const RECORD_END_COLUMN: &str = "_RECORD_END";

/// True for column names the engine provides implicitly.
pub fn is_special_column(name: &str) -> bool {
    matches!(
        name,
        ANY_EVENT_COLUMN | RECORD_START_COLUMN | RECORD_END_COLUMN
    )
}

/// Validate a predicate or window name: non-empty, alphanumeric or '_'.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// How a plain predicate matches an event code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateCode {
    /// Exact code literal.
    Literal(String),
    /// Any of the listed code literals.
    Any { any: Vec<String> },
    /// Codes matching a regular expression.
    Regex { regex: String },
}

/// A predicate computed directly from raw event data by the ingestion
/// collaborator. The value bounds and extra column matches are carried
/// through for that collaborator; the engine uses only the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainPredicate {
    pub code: PredicateCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_min_inclusive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_max_inclusive: Option<bool>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub other_cols: IndexMap<String, String>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl PlainPredicate {
    pub fn literal(code: impl Into<String>) -> Self {
        Self {
            code: PredicateCode::Literal(code.into()),
            value_min: None,
            value_max: None,
            value_min_inclusive: None,
            value_max_inclusive: None,
            other_cols: IndexMap::new(),
            is_static: false,
        }
    }
}

/// A flat boolean combination of previously defined predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedExpr {
    /// Count is 1 when every operand fired on the row.
    All(Vec<String>),
    /// Count is 1 when any operand fired on the row.
    AnyOf(Vec<String>),
}

impl DerivedExpr {
    /// Parse `and(p, q, ...)` / `or(p, q, ...)`. Nesting and negation are
    /// not part of the language.
    pub fn parse(expr: &str) -> ConfigResult<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ConfigError::InvalidDerivedExpr {
                expr: expr.to_string(),
                reason: "expression is empty".into(),
            });
        }

        let (is_and, inner) = if let Some(inner) = expr.strip_prefix("and(").and_then(|r| r.strip_suffix(')')) {
            (true, inner)
        } else if let Some(inner) = expr.strip_prefix("or(").and_then(|r| r.strip_suffix(')')) {
            (false, inner)
        } else {
            return Err(ConfigError::InvalidDerivedExpr {
                expr: expr.to_string(),
                reason: "expression must have the form 'and(...)' or 'or(...)'".into(),
            });
        };

        let operands: Vec<String> = inner
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if operands.len() < 2 {
            return Err(ConfigError::InvalidDerivedExpr {
                expr: expr.to_string(),
                reason: "expression needs at least two comma-separated operands".into(),
            });
        }
        for operand in &operands {
            if !is_valid_name(operand) {
                return Err(ConfigError::InvalidDerivedExpr {
                    expr: expr.to_string(),
                    reason: format!("operand '{operand}' is not a valid predicate name"),
                });
            }
        }

        Ok(if is_and {
            DerivedExpr::All(operands)
        } else {
            DerivedExpr::AnyOf(operands)
        })
    }

    pub fn operands(&self) -> &[String] {
        match self {
            DerivedExpr::All(ops) | DerivedExpr::AnyOf(ops) => ops,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPredicate {
    pub expr: DerivedExpr,
}

/// A named predicate definition.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateDef {
    Plain(PlainPredicate),
    Derived(DerivedPredicate),
}

impl PredicateDef {
    pub fn is_plain(&self) -> bool {
        matches!(self, PredicateDef::Plain(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, PredicateDef::Plain(p) if p.is_static)
    }
}

/// Check that every derived operand is defined and that the derivation
/// graph is acyclic; returns the derived predicate names in an order where
/// operands precede their dependents (Kahn's algorithm).
pub fn derived_evaluation_order(
    predicates: &IndexMap<String, PredicateDef>,
) -> ConfigResult<Vec<String>> {
    let mut in_degree: IndexMap<&str, usize> = IndexMap::new();
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();

    for (name, def) in predicates {
        if let PredicateDef::Derived(derived) = def {
            let mut degree = 0;
            for operand in derived.expr.operands() {
                match predicates.get(operand.as_str()) {
                    None => {
                        return Err(ConfigError::UnknownPredicate {
                            name: operand.clone(),
                            referenced_by: name.clone(),
                        })
                    }
                    Some(PredicateDef::Derived(_)) => {
                        dependents
                            .entry(operand.as_str())
                            .or_default()
                            .push(name.as_str());
                        degree += 1;
                    }
                    Some(PredicateDef::Plain(_)) => {}
                }
            }
            in_degree.insert(name.as_str(), degree);
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(name) = ready.pop() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            let degree = in_degree
                .get_mut(dependent)
                .expect("dependent is a derived predicate");
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() < in_degree.len() {
        let stuck = in_degree
            .iter()
            .find(|(_, degree)| **degree > 0)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();
        return Err(ConfigError::PredicateCycle(stuck));
    }
    Ok(order)
}
