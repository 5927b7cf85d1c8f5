//! Duration grammar shared with the orchestrator
//!
//! Durations travel as compact strings: nonzero days, hours, minutes, and
//! seconds appended in that order with `d h m s` suffixes (`"2h30m"`,
//! `"1m30s"`, `"7d"`). A zero duration is `"0s"`. Absolute instants travel
//! as RFC 3339 UTC.

use crate::{InngestError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Format a duration largest-unit-first with second resolution
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    let days = secs / SECS_PER_DAY;
    if days > 0 {
        out.push_str(&format!("{}d", days));
        secs %= SECS_PER_DAY;
    }
    let hours = secs / SECS_PER_HOUR;
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
        secs %= SECS_PER_HOUR;
    }
    let minutes = secs / SECS_PER_MINUTE;
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
        secs %= SECS_PER_MINUTE;
    }
    if secs > 0 {
        out.push_str(&format!("{}s", secs));
    }
    out
}

/// Parse a duration string produced by [`format_duration`]
///
/// Accepts any sequence of `<number><unit>` terms with units `d`, `h`, `m`,
/// `s`, e.g. `"5m"`, `"2h30m"`, `"90s"`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InngestError::bad_request("empty duration"));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(InngestError::bad_request(format!(
                "invalid duration '{}': unit '{}' without a value",
                s, c
            )));
        }
        let value: u64 = digits.parse().map_err(|_| {
            InngestError::bad_request(format!("invalid duration '{}': bad number", s))
        })?;
        digits.clear();
        let unit_secs = match c {
            'd' => SECS_PER_DAY,
            'h' => SECS_PER_HOUR,
            'm' => SECS_PER_MINUTE,
            's' => 1,
            other => {
                return Err(InngestError::bad_request(format!(
                    "invalid duration '{}': unknown unit '{}'",
                    s, other
                )));
            }
        };
        total += value * unit_secs;
    }

    if !digits.is_empty() {
        return Err(InngestError::bad_request(format!(
            "invalid duration '{}': trailing number without a unit",
            s
        )));
    }

    Ok(Duration::from_secs(total))
}

/// Format an absolute instant as RFC 3339 UTC
pub fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
