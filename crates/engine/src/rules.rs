// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pattern-rule detection (the `pattern-scan` stage).
//!
//! Complements template scanning with regex rules over fetched page
//! content and response headers.

use pal_core::{Evidence, Finding, FindingId, FindingTarget, IdGen, Severity, UuidIdGen};
use regex::Regex;

/// Stage id used as finding source / merge provenance.
pub const SOURCE: &str = "pattern-scan";

/// Cap on matched-content snippets retained per rule hit.
const SNIPPET_CAP: usize = 160;

/// One detection rule.
pub struct Rule {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub category: &'static str,
    pub cwe_id: u32,
    pub owasp: &'static str,
    pub pattern: Regex,
    pub remediation: &'static str,
    pub confidence: f64,
}

/// The compiled rule set applied by the pattern-scan stage.
pub struct RuleSet {
    rules: Vec<Rule>,
}

macro_rules! rule {
    ($id:literal, $name:literal, $severity:expr, $category:literal, $cwe:literal, $owasp:literal, $pattern:literal, $remediation:literal, $confidence:literal) => {
        Rule {
            id: $id,
            name: $name,
            severity: $severity,
            category: $category,
            cwe_id: $cwe,
            owasp: $owasp,
            // Patterns are static and covered by tests.
            #[allow(clippy::unwrap_used)]
            pattern: Regex::new($pattern).unwrap(),
            remediation: $remediation,
            confidence: $confidence,
        }
    };
}

impl RuleSet {
    /// The built-in detection rules.
    pub fn builtin() -> Self {
        use Severity::*;
        let rules = vec![
            rule!(
                "sql-error-disclosure",
                "SQL Error Message Disclosure",
                Medium,
                "information-disclosure",
                209,
                "A05:2021",
                r"(?i)(sql syntax.*?error|unclosed quotation mark|pg_query\(\)|ORA-\d{5}|SQLSTATE\[\w+\])",
                "Disable verbose database errors in production responses.",
                0.8
            ),
            rule!(
                "stack-trace-disclosure",
                "Stack Trace Disclosure",
                Medium,
                "information-disclosure",
                209,
                "A05:2021",
                r"(?m)^\s+at [\w$.]+\([\w$.]+\.java:\d+\)|Traceback \(most recent call last\)",
                "Return generic error pages; log stack traces server-side only.",
                0.8
            ),
            rule!(
                "directory-listing",
                "Directory Listing Enabled",
                Low,
                "misconfiguration",
                548,
                "A05:2021",
                r"(?i)<title>Index of /",
                "Disable autoindex on the web server.",
                0.9
            ),
            rule!(
                "aws-access-key",
                "AWS Access Key Exposure",
                Critical,
                "secret-exposure",
                798,
                "A02:2021",
                r"\bAKIA[0-9A-Z]{16}\b",
                "Revoke the exposed key and move credentials to a secret store.",
                0.95
            ),
            rule!(
                "private-key-block",
                "Private Key Material Exposure",
                Critical,
                "secret-exposure",
                321,
                "A02:2021",
                r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----",
                "Remove the key from the served content and rotate it.",
                0.95
            ),
            rule!(
                "hardcoded-password",
                "Hardcoded Credential",
                High,
                "secret-exposure",
                798,
                "A07:2021",
                r#"(?i)password["']?\s*[:=]\s*["'][^"']{6,}["']"#,
                "Load credentials from configuration or a secret store.",
                0.6
            ),
            rule!(
                "internal-ip-disclosure",
                "Internal IP Address Disclosure",
                Low,
                "information-disclosure",
                200,
                "A01:2021",
                r"\b(?:10\.\d{1,3}|192\.168|172\.(?:1[6-9]|2\d|3[01]))\.\d{1,3}\.\d{1,3}\b",
                "Strip internal addressing from public responses.",
                0.5
            ),
            rule!(
                "server-version-banner",
                "Server Version Disclosure",
                Info,
                "information-disclosure",
                200,
                "A05:2021",
                r"(?im)^server: .+/[\d.]+",
                "Suppress version numbers in the Server header.",
                0.9
            ),
            rule!(
                "cors-wildcard",
                "Permissive CORS Policy",
                Medium,
                "misconfiguration",
                942,
                "A05:2021",
                r"(?im)^access-control-allow-origin: \*",
                "Restrict allowed origins to trusted hosts.",
                0.9
            ),
            rule!(
                "debug-mode-banner",
                "Debug Mode Enabled",
                High,
                "misconfiguration",
                489,
                "A05:2021",
                r"(?i)(werkzeug debugger|whoops, looks like something went wrong|django.*DEBUG = True)",
                "Disable debug mode in production.",
                0.85
            ),
        ];
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Scan content observed at `host` (+ optional path), one finding per
    /// matching rule with matched snippets as evidence.
    pub fn scan(&self, content: &str, host: &str, path: Option<&str>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let mut snippets: Vec<String> = Vec::new();
            for hit in rule.pattern.find_iter(content).take(3) {
                let mut snippet = hit.as_str().to_string();
                snippet.truncate(SNIPPET_CAP);
                snippets.push(snippet);
            }
            if snippets.is_empty() {
                continue;
            }

            let target = FindingTarget {
                host: host.to_string(),
                port: None,
                path: path.map(str::to_string),
            };
            findings.push(Finding {
                id: FindingId::new(UuidIdGen.next()),
                title: rule.name.to_string(),
                description: format!("Rule {} matched response content.", rule.id),
                severity: rule.severity,
                category: rule.category.to_string(),
                source: SOURCE.to_string(),
                target,
                evidence: snippets
                    .into_iter()
                    .map(|content| Evidence {
                        source: SOURCE.to_string(),
                        content,
                    })
                    .collect(),
                references: vec![
                    format!("CWE-{}", rule.cwe_id),
                    format!("OWASP {}", rule.owasp),
                ],
                tags: vec![rule.category.to_string(), "pattern-detection".to_string()],
                remediation: Some(rule.remediation.to_string()),
                confidence: rule.confidence,
                cwe_id: Some(rule.cwe_id),
                provenance: Vec::new(),
            });
        }
        findings
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
