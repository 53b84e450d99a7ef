// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration strings for `interval:`, `loop:` and timeout sections.

use std::time::Duration;
use thiserror::Error;

/// Errors from duration string parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,
    #[error("invalid number in duration: {0}")]
    InvalidNumber(String),
    #[error("unknown duration suffix: {0}")]
    UnknownSuffix(String),
}

/// Parse a duration string like "200ms", "30s", "5m", "1h" into a Duration.
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: f64 = num_str
        .parse()
        .map_err(|_| DurationError::InvalidNumber(s.to_string()))?;

    let duration = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => Duration::from_millis(num as u64),
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs_f64(num),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::from_secs_f64(num * 60.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::from_secs_f64(num * 3600.0),
        other => return Err(DurationError::UnknownSuffix(other.to_string())),
    };

    Ok(duration)
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
