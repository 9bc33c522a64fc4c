// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 5: sensitive-data pattern scanning.

use regex::Regex;
use serde::Serialize;

/// Samples retained per pattern hit.
const SAMPLE_CAP: usize = 3;

/// One sensitive-data pattern match group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensitiveHit {
    /// Pattern kind, e.g. `accesskey`, `phone`, `email`.
    pub kind: String,
    pub count: usize,
    /// Up to three samples as evidence.
    pub samples: Vec<String>,
}

struct Pattern {
    kind: &'static str,
    regex: Regex,
    /// Index of the capture group holding the secret (0 = whole match).
    group: usize,
}

// Expressions are static and covered by tests.
#[allow(clippy::unwrap_used)]
fn patterns() -> Vec<Pattern> {
    let table: &[(&str, &str, usize)] = &[
        (
            "accesskey",
            r#"(?i)access[_-]?key["']?\s*[:=]\s*["']([a-zA-Z0-9]{20,})["']"#,
            1,
        ),
        (
            "secretkey",
            r#"(?i)secret[_-]?key["']?\s*[:=]\s*["']([a-zA-Z0-9]{20,})["']"#,
            1,
        ),
        (
            "password",
            r#"(?i)password["']?\s*[:=]\s*["']([^"']{6,})["']"#,
            1,
        ),
        (
            "api_key",
            r#"(?i)api[_-]?key["']?\s*[:=]\s*["']([a-zA-Z0-9]{20,})["']"#,
            1,
        ),
        (
            "token",
            r#"(?i)token["']?\s*[:=]\s*["']([a-zA-Z0-9._-]{20,})["']"#,
            1,
        ),
        // CN mobile numbers
        ("phone", r"\b1[3-9]\d{9}\b", 0),
        (
            "email",
            r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
            0,
        ),
        // National id numbers (17 digits + checksum digit/X)
        ("id_card", r"\b\d{17}[\dxX]\b", 0),
    ];
    table
        .iter()
        .map(|(kind, pattern, group)| Pattern {
            kind,
            regex: Regex::new(pattern).unwrap(),
            group: *group,
        })
        .collect()
}

/// Scan content for sensitive-data patterns. One hit per matching kind,
/// with a bounded sample list.
pub fn scan_sensitive(content: &str) -> Vec<SensitiveHit> {
    let mut hits = Vec::new();
    for pattern in patterns() {
        let mut samples: Vec<String> = Vec::new();
        let mut count = 0usize;
        for capture in pattern.regex.captures_iter(content) {
            count += 1;
            if samples.len() < SAMPLE_CAP {
                if let Some(m) = capture.get(pattern.group) {
                    samples.push(m.as_str().to_string());
                }
            }
        }
        if count > 0 {
            hits.push(SensitiveHit {
                kind: pattern.kind.to_string(),
                count,
                samples,
            });
        }
    }
    hits
}

#[cfg(test)]
#[path = "sensitive_tests.rs"]
mod tests;
