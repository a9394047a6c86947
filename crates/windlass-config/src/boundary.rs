//! Boundary-expression parsing.
//!
//! The grammar, in order of precedence:
//!
//! ```text
//! expr := ref " -> " predicate     next event satisfying predicate
//!       | ref " <- " predicate     previous event satisfying predicate
//!       | ref " + " duration       fixed offset after the reference
//!       | ref " - " duration       fixed offset before the reference
//!       | ref                      same instant as the reference
//! ref  := "trigger" | windowName ".start" | windowName ".end" | "start" | "end"
//! ```
//!
//! Bare `start`/`end` refer to the enclosing window's own boundaries.

use chrono::Duration;
use tracing::warn;

use windlass_core::predicate::is_valid_name;
use windlass_core::{parse_duration, ConfigError, ConfigResult, Side};

/// A reference as written, before window names are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRef {
    /// `trigger`, or the enclosing window's own `start`/`end`.
    Bare(String),
    /// Another window's boundary, written `window.side`.
    WindowField { window: String, side: Side },
}

impl RawRef {
    pub fn is_self_start(&self) -> bool {
        matches!(self, RawRef::Bare(name) if name == "start")
    }

    pub fn is_self_end(&self) -> bool {
        matches!(self, RawRef::Bare(name) if name == "end")
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, RawRef::Bare(name) if name == "trigger")
    }
}

/// The operation applied to the referenced instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryOp {
    Identity,
    Offset(Duration),
    Next(String),
    Prev(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBoundary {
    pub reference: RawRef,
    pub op: BoundaryOp,
}

fn invalid(boundary: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidBoundary {
        boundary: boundary.to_string(),
        reason: reason.into(),
    }
}

fn parse_reference(boundary: &str, text: &str) -> ConfigResult<RawRef> {
    let text = text.trim();
    if let Some((window, side)) = text.split_once('.') {
        if window.contains('.') || side.contains('.') {
            return Err(invalid(boundary, "reference contains more than one '.'"));
        }
        if !is_valid_name(window) {
            return Err(invalid(boundary, format!("'{window}' is not a valid window name")));
        }
        let side = match side {
            "start" => Side::Start,
            "end" => Side::End,
            other => {
                return Err(invalid(
                    boundary,
                    format!("reference must end in '.start' or '.end', got '.{other}'"),
                ))
            }
        };
        Ok(RawRef::WindowField {
            window: window.to_string(),
            side,
        })
    } else if is_valid_name(text) {
        Ok(RawRef::Bare(text.to_string()))
    } else {
        Err(invalid(boundary, format!("'{text}' is not a valid reference")))
    }
}

fn parse_event_predicate(boundary: &str, text: &str) -> ConfigResult<String> {
    let text = text.trim();
    if !is_valid_name(text) {
        return Err(invalid(
            boundary,
            format!("'{text}' is not a valid predicate name"),
        ));
    }
    Ok(text.to_string())
}

/// Parse one boundary expression.
pub fn parse_boundary(boundary: &str) -> ConfigResult<ParsedBoundary> {
    let text = boundary.trim();
    if text.is_empty() {
        return Err(invalid(boundary, "boundary is empty"));
    }

    let has_next = text.contains("->");
    let has_prev = text.contains("<-");
    if has_next && has_prev {
        return Err(invalid(boundary, "cannot contain both '->' and '<-'"));
    }
    if has_next || has_prev {
        let separator = if has_next { "->" } else { "<-" };
        let (ref_text, pred_text) = text
            .split_once(separator)
            .expect("separator presence checked above");
        let reference = parse_reference(boundary, ref_text)?;
        let predicate = parse_event_predicate(boundary, pred_text)?;
        let op = if has_next {
            BoundaryOp::Next(predicate)
        } else {
            BoundaryOp::Prev(predicate)
        };
        return Ok(ParsedBoundary { reference, op });
    }

    let has_plus = text.contains('+');
    let has_minus = text.contains('-');
    if has_plus && has_minus {
        return Err(invalid(boundary, "cannot contain both '+' and '-'"));
    }
    if has_plus || has_minus {
        let separator = if has_plus { '+' } else { '-' };
        let (ref_text, offset_text) = text
            .split_once(separator)
            .expect("separator presence checked above");
        let reference = parse_reference(boundary, ref_text)?;
        let mut delta = parse_duration(offset_text.trim())?;
        if has_minus {
            delta = -delta;
        }
        if delta == Duration::zero() {
            warn!("boundary '{boundary}' has a zero offset; treating it as an identity reference");
            return Ok(ParsedBoundary {
                reference,
                op: BoundaryOp::Identity,
            });
        }
        return Ok(ParsedBoundary {
            reference,
            op: BoundaryOp::Offset(delta),
        });
    }

    Ok(ParsedBoundary {
        reference: parse_reference(boundary, text)?,
        op: BoundaryOp::Identity,
    })
}
