// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of caller-supplied timestamps to absolute UTC instants.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use simplemem_core::SimpleMemError;
use simplemem_core::types::TIMESTAMP_FORMAT;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Resolve `raw` to an absolute instant.
///
/// Offset-bearing timestamps are converted to UTC. Relative offsets of the
/// form `+<n><s|m|h|d>` are applied to `reference`, the timestamp of the most
/// recently buffered turn; without one they cannot be resolved.
pub fn resolve_timestamp(
    raw: &str,
    reference: Option<NaiveDateTime>,
) -> Result<NaiveDateTime, SimpleMemError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed(raw, "timestamp is empty"));
    }

    if let Some(offset) = trimmed.strip_prefix('+') {
        let delta = parse_offset(offset).ok_or_else(|| {
            malformed(
                raw,
                "relative offset must look like +30s, +15m, +2h or +1d and fit the calendar",
            )
        })?;
        let base = reference
            .ok_or_else(|| malformed(raw, "relative offset has no earlier turn to anchor on"))?;
        return base
            .checked_add_signed(delta)
            .ok_or_else(|| malformed(raw, "offset overflows the calendar"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }

    Err(malformed(raw, "unrecognized timestamp format"))
}

/// Render an instant the way canonical fact text embeds it.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_offset(offset: &str) -> Option<TimeDelta> {
    let unit = offset.chars().last()?;
    let amount: i64 = offset[..offset.len() - unit.len_utf8()].parse().ok()?;
    if amount < 0 {
        return None;
    }
    match unit {
        's' => TimeDelta::try_seconds(amount),
        'm' => TimeDelta::try_minutes(amount),
        'h' => TimeDelta::try_hours(amount),
        'd' => TimeDelta::try_days(amount),
        _ => None,
    }
}

fn malformed(raw: &str, reason: &str) -> SimpleMemError {
    SimpleMemError::MalformedTimestamp {
        raw: raw.to_string(),
        reason: reason.to_string(),
    }
}
