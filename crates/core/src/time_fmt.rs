// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Elapsed-time formatting and interval-string parsing.

use std::time::Duration;

/// Format milliseconds as a compact elapsed string: `"850ms"`, `"12s"`,
/// `"2m 05s"`, `"1h 03m"`.
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1_000;
    if secs < 60 {
        return format!("{}s", secs);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m {:02}s", mins, secs % 60);
    }
    format!("{}h {:02}m", mins / 60, mins % 60)
}

/// Parse an interval duration string: `"45s"`, `"30m"`, `"6h"`, `"1d"`.
/// A bare number is seconds.
pub fn parse_interval(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (value, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };
    let value: u64 = value.parse().ok()?;
    if value == 0 {
        return None;
    }
    let secs = match unit {
        None | Some('s') => value,
        Some('m') => value * 60,
        Some('h') => value * 3_600,
        Some('d') => value * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
