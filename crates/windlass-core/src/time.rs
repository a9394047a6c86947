//! Duration literal parsing.
//!
//! Window offsets are written as signed, human-friendly literals such as
//! `+12h`, `-365 days`, or `1 day 6 hours`. A leading sign applies to the
//! whole literal; terms accumulate.

use chrono::Duration;

use crate::error::{ConfigError, ConfigResult};

const MICROS_PER_SECOND: i64 = 1_000_000;

fn unit_micros(unit: &str) -> Option<i64> {
    match unit {
        "d" | "day" | "days" => Some(86_400 * MICROS_PER_SECOND),
        "h" | "hour" | "hours" => Some(3_600 * MICROS_PER_SECOND),
        "m" | "min" | "minute" | "minutes" => Some(60 * MICROS_PER_SECOND),
        "s" | "sec" | "second" | "seconds" => Some(MICROS_PER_SECOND),
        _ => None,
    }
}

fn invalid(literal: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidDuration {
        literal: literal.to_string(),
        reason: reason.into(),
    }
}

/// Parse a duration literal into a signed microsecond delta.
///
/// The grammar is `[+|-] <int> <unit> [<int> <unit> ...]` where `<unit>` is
/// one of `d`/`days`, `h`/`hours`, `m`/`min`/`minutes`, `s`/`seconds`
/// (singular forms accepted). Whitespace between the count and its unit is
/// optional.
pub fn parse_duration(literal: &str) -> ConfigResult<Duration> {
    let mut rest = literal.trim();
    if rest.is_empty() {
        return Err(invalid(literal, "empty literal"));
    }

    let negative = match rest.as_bytes()[0] {
        b'-' => {
            rest = rest[1..].trim_start();
            true
        }
        b'+' => {
            rest = rest[1..].trim_start();
            false
        }
        _ => false,
    };

    let mut total_micros: i64 = 0;
    let mut saw_term = false;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(invalid(literal, format!("expected a count, found '{rest}'")));
        }
        let count: i64 = rest[..digits_end]
            .parse()
            .map_err(|_| invalid(literal, "count out of range"))?;
        rest = rest[digits_end..].trim_start();

        let unit_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if unit_end == 0 {
            return Err(invalid(literal, "missing unit after count"));
        }
        let unit = &rest[..unit_end];
        let scale = unit_micros(unit).ok_or_else(|| invalid(literal, format!("unknown unit '{unit}'")))?;
        rest = rest[unit_end..].trim_start();

        let term = count
            .checked_mul(scale)
            .ok_or_else(|| invalid(literal, "duration out of range"))?;
        total_micros = total_micros
            .checked_add(term)
            .ok_or_else(|| invalid(literal, "duration out of range"))?;
        saw_term = true;
    }

    if !saw_term {
        return Err(invalid(literal, "empty literal"));
    }
    if negative {
        total_micros = -total_micros;
    }
    Ok(Duration::microseconds(total_micros))
}
