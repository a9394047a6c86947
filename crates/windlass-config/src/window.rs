//! Per-window validation and kernel-bound derivation.

use indexmap::IndexMap;

use windlass_core::predicate::is_valid_name;
use windlass_core::{
    BoundDirection, BoundTarget, BoundarySpec, ConfigError, ConfigResult, CountBounds, EventBounds,
    KernelBounds, Reference, Side, TemporalBounds, RECORD_END_COLUMN, RECORD_START_COLUMN,
};

use crate::boundary::{parse_boundary, BoundaryOp, ParsedBoundary, RawRef};
use crate::schema::RawWindow;

/// A validated window configuration.
///
/// Exactly one side of a window anchors it externally (to the trigger or to
/// another window's boundary); the other side is defined relative to the
/// anchoring side and carries the window's `has` constraints. The window
/// tree places the anchor side between the external reference and the
/// constrained side.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub name: String,
    pub start_text: Option<String>,
    pub end_text: Option<String>,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
    pub has: IndexMap<String, CountBounds>,
    pub label: Option<String>,
    pub index_timestamp: Option<Side>,
    parsed_start: ParsedBoundary,
    parsed_end: ParsedBoundary,
    start_references_end: bool,
}

fn parse_count_bounds(window: &str, predicate: &str, text: &str) -> ConfigResult<CountBounds> {
    let constraint_error = |reason: String| ConfigError::InvalidConstraint {
        predicate: format!("{window}.has.{predicate}"),
        reason,
    };

    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(trimmed);
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(constraint_error(format!(
            "expected '(min, max)', got '{text}'"
        )));
    }

    let parse_bound = |part: &str| -> ConfigResult<Option<i64>> {
        if part.is_empty() || part == "None" {
            return Ok(None);
        }
        let value: i64 = part
            .parse()
            .map_err(|_| constraint_error(format!("'{part}' is not an integer")))?;
        if value < 0 {
            return Err(constraint_error(format!("count bound {value} is negative")));
        }
        Ok(Some(value))
    };

    let min = parse_bound(parts[0])?;
    let max = parse_bound(parts[1])?;
    CountBounds::new(min, max).map_err(|e| match e {
        ConfigError::InvalidConstraint { reason, .. } => constraint_error(reason),
        other => other,
    })
}

impl WindowConfig {
    pub fn new(name: &str, raw: &RawWindow) -> ConfigResult<Self> {
        if !is_valid_name(name) {
            return Err(ConfigError::InvalidWindowName(name.to_string()));
        }

        let mut has = IndexMap::new();
        for (predicate, bounds_text) in &raw.has {
            has.insert(
                predicate.clone(),
                parse_count_bounds(name, predicate, bounds_text)?,
            );
        }

        let index_timestamp = match raw.index_timestamp.as_deref() {
            None => None,
            Some("start") => Some(Side::Start),
            Some("end") => Some(Side::End),
            Some(other) => {
                return Err(ConfigError::InvalidIndexTimestamp {
                    window: name.to_string(),
                    value: other.to_string(),
                })
            }
        };

        if raw.start.is_none() && raw.end.is_none() {
            return Err(ConfigError::BothEndsOpen {
                window: name.to_string(),
            });
        }

        // A NULL start walks back from the end to the first record row; a
        // NULL end walks forward from the start to the last one.
        let parsed_start = match &raw.start {
            None => ParsedBoundary {
                reference: RawRef::Bare("end".into()),
                op: BoundaryOp::Prev(RECORD_START_COLUMN.into()),
            },
            Some(text) => parse_boundary(text)?,
        };
        let parsed_end = match &raw.end {
            None => ParsedBoundary {
                reference: RawRef::Bare("start".into()),
                op: BoundaryOp::Next(RECORD_END_COLUMN.into()),
            },
            Some(text) => parse_boundary(text)?,
        };

        let start_text = raw.start.clone().unwrap_or_else(|| "NULL".into());
        let end_text = raw.end.clone().unwrap_or_else(|| "NULL".into());
        let order_error = || ConfigError::WindowOrder {
            window: name.to_string(),
            start: start_text.clone(),
            end: end_text.clone(),
        };

        if parsed_start.reference.is_self_start() || parsed_end.reference.is_self_end() {
            return Err(ConfigError::InvalidBoundary {
                boundary: format!("{start_text} / {end_text}"),
                reason: "a boundary cannot reference itself".into(),
            });
        }

        let start_references_end = match (
            parsed_start.reference.is_self_end(),
            parsed_end.reference.is_self_start(),
        ) {
            (true, false) => true,
            (false, true) => false,
            _ => {
                return Err(ConfigError::NoAnchor {
                    window: name.to_string(),
                    start: start_text.clone(),
                    end: end_text.clone(),
                })
            }
        };

        // The self-referencing side must move toward its own end of the
        // window: a start defined from the end looks backward, an end
        // defined from the start looks forward.
        if start_references_end {
            match &parsed_start.op {
                BoundaryOp::Prev(_) | BoundaryOp::Identity => {}
                BoundaryOp::Next(_) => return Err(order_error()),
                BoundaryOp::Offset(delta) => {
                    if *delta > chrono::Duration::zero() {
                        return Err(order_error());
                    }
                }
            }
        } else {
            match &parsed_end.op {
                BoundaryOp::Next(_) | BoundaryOp::Identity => {}
                BoundaryOp::Prev(_) => return Err(order_error()),
                BoundaryOp::Offset(delta) => {
                    if *delta < chrono::Duration::zero() {
                        return Err(order_error());
                    }
                }
            }
        }

        let window = Self {
            name: name.to_string(),
            start_text: raw.start.clone(),
            end_text: raw.end.clone(),
            start_inclusive: raw.start_inclusive,
            end_inclusive: raw.end_inclusive,
            has,
            label: raw.label.clone(),
            index_timestamp,
            parsed_start,
            parsed_end,
            start_references_end,
        };

        // The constrained side is the window's content; if it collapses to
        // an identity reference there is no interval to constrain or label.
        if window.constrained_boundary().op == BoundaryOp::Identity {
            let field = if !window.has.is_empty() {
                Some("has constraints")
            } else if window.label.is_some() {
                Some("a label")
            } else if window.index_timestamp.is_some() {
                Some("an index_timestamp")
            } else {
                None
            };
            if let Some(field) = field {
                return Err(ConfigError::EmptyWindowExtent {
                    window: name.to_string(),
                    field: field.to_string(),
                });
            }
        }

        let anchor_reference = &window.anchor_boundary().reference;
        if let RawRef::Bare(bare) = anchor_reference {
            if !anchor_reference.is_trigger() {
                return Err(ConfigError::InvalidBoundary {
                    boundary: bare.clone(),
                    reason: format!(
                        "window '{name}' must anchor to 'trigger' or another window's boundary"
                    ),
                });
            }
        }

        if let Some(bounds) = window.constrained_bounds() {
            if let KernelBounds::Event(event) = &bounds {
                event.validate_direction(name)?;
            }
        }
        if let Some(KernelBounds::Event(event)) = window.anchor_bounds() {
            event.validate_direction(name)?;
        }

        Ok(window)
    }

    /// The side that references an external anchor (the trigger or another
    /// window's boundary).
    pub fn anchor_side(&self) -> Side {
        if self.start_references_end {
            Side::End
        } else {
            Side::Start
        }
    }

    /// The side defined relative to the anchor side; it carries the `has`
    /// constraints.
    pub fn constrained_side(&self) -> Side {
        self.anchor_side().opposite()
    }

    /// The boundary of the anchoring side, whose reference points outside
    /// this window.
    fn anchor_boundary(&self) -> &ParsedBoundary {
        match self.anchor_side() {
            Side::Start => &self.parsed_start,
            Side::End => &self.parsed_end,
        }
    }

    fn constrained_boundary(&self) -> &ParsedBoundary {
        match self.constrained_side() {
            Side::Start => &self.parsed_start,
            Side::End => &self.parsed_end,
        }
    }

    fn resolve_reference(&self, raw: &RawRef) -> Reference {
        match raw {
            RawRef::Bare(bare) if bare == "end" => Reference::window(&self.name, Side::End),
            RawRef::Bare(bare) if bare == "start" => Reference::window(&self.name, Side::Start),
            RawRef::Bare(_) => Reference::Trigger,
            RawRef::WindowField { window, side } => Reference::window(window, *side),
        }
    }

    /// The fully resolved endpoint expression of one side of this window.
    pub fn boundary_spec(&self, side: Side) -> BoundarySpec {
        let (raw_text, parsed) = match side {
            Side::Start => (&self.start_text, &self.parsed_start),
            Side::End => (&self.end_text, &self.parsed_end),
        };
        if raw_text.is_none() {
            return BoundarySpec::Null;
        }
        let reference = self.resolve_reference(&parsed.reference);
        match &parsed.op {
            BoundaryOp::Identity => BoundarySpec::Identity(reference),
            BoundaryOp::Offset(delta) => BoundarySpec::Offset(reference, *delta),
            BoundaryOp::Next(predicate) => BoundarySpec::Next(reference, predicate.clone()),
            BoundaryOp::Prev(predicate) => BoundarySpec::Prev(reference, predicate.clone()),
        }
    }

    fn op_bounds(op: &BoundaryOp, left_inclusive: bool, right_inclusive: bool) -> Option<KernelBounds> {
        match op {
            BoundaryOp::Identity => None,
            BoundaryOp::Offset(delta) => Some(KernelBounds::Temporal(TemporalBounds::new(
                left_inclusive,
                *delta,
                right_inclusive,
            ))),
            BoundaryOp::Next(predicate) => Some(KernelBounds::Event(EventBounds::new(
                left_inclusive,
                BoundTarget::from_name(predicate),
                BoundDirection::Forward,
                right_inclusive,
            ))),
            BoundaryOp::Prev(predicate) => Some(KernelBounds::Event(EventBounds::new(
                left_inclusive,
                BoundTarget::from_name(predicate),
                BoundDirection::Backward,
                right_inclusive,
            ))),
        }
    }

    /// Kernel bounds for the edge from the anchor side to the constrained
    /// side. The window's inclusivity flags apply here, in chronological
    /// order (start = left).
    pub fn constrained_bounds(&self) -> Option<KernelBounds> {
        Self::op_bounds(
            &self.constrained_boundary().op,
            self.start_inclusive,
            self.end_inclusive,
        )
    }

    /// Kernel bounds for the edge from the external reference to the anchor
    /// side. That edge spans the gap between two windows rather than this
    /// window's own content, so no events on it are counted toward `has`
    /// and its endpoints are treated as exclusive.
    pub fn anchor_bounds(&self) -> Option<KernelBounds> {
        Self::op_bounds(&self.anchor_boundary().op, false, false)
    }

    /// Every predicate name this window mentions, excluding the implicit
    /// `*`/`_ANY_EVENT` and record-edge markers.
    pub fn referenced_predicates(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if name != "*"
                && !windlass_core::is_special_column(name)
                && !names.iter().any(|n| n == name)
            {
                names.push(name.to_string());
            }
        };
        for predicate in self.has.keys() {
            push(predicate);
        }
        for boundary in [&self.parsed_start, &self.parsed_end] {
            if let BoundaryOp::Next(p) | BoundaryOp::Prev(p) = &boundary.op {
                push(p);
            }
        }
        if let Some(label) = &self.label {
            push(label);
        }
        names
    }
}
