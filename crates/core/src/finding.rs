// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Findings produced by scan tools, and the fingerprint that identifies
//! "the same vulnerability" across tools.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a finding.
    pub struct FindingId;
}

/// Severity, ordered ascending so `max()` picks the worst.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse tool output leniently; anything unrecognised maps to `Info`.
    pub fn parse(raw: &str) -> Severity {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Where a finding was observed: host plus either a port or a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindingTarget {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FindingTarget {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            path: None,
        }
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            path: None,
        }
    }

    pub fn with_path(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            path: Some(path.into()),
        }
    }

    /// The path-or-port component of the fingerprint input.
    fn locator(&self) -> String {
        match (&self.path, self.port) {
            (Some(path), _) => path.clone(),
            (None, Some(port)) => port.to_string(),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for FindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(path) = &self.path {
            write!(f, "{}", path)?;
        }
        Ok(())
    }
}

/// A piece of supporting evidence from one contributing source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,
    pub content: String,
}

/// One `(source, observed-at)` provenance entry attached after merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub observed_at_ms: u64,
}

/// Stable identity of "the same vulnerability" across tool sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A vulnerability or observation reported by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    /// Category, e.g. `injection`, `exposure`, `misconfiguration`.
    pub category: String,
    /// Stage/tool that produced the finding.
    pub source: String,
    pub target: FindingTarget,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// CVE/CWE/OWASP references.
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// Confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<u32>,
    /// Contributing sources in first-observed order, deduplicated by source.
    #[serde(default)]
    pub provenance: Vec<Provenance>,
}

impl Finding {
    /// Compute the stable fingerprint: SHA-256 over the normalised title,
    /// category, target host, path-or-port, and CWE id (when present).
    ///
    /// Immutable by construction: merging never rewrites the fields that
    /// feed this hash.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(normalize_title(&self.title));
        hasher.update(b"\x1f");
        hasher.update(self.category.to_ascii_lowercase());
        hasher.update(b"\x1f");
        hasher.update(self.target.host.to_ascii_lowercase());
        hasher.update(b"\x1f");
        hasher.update(self.target.locator());
        hasher.update(b"\x1f");
        if let Some(cwe) = self.cwe_id {
            hasher.update(cwe.to_string());
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{:02x}", byte);
        }
        Fingerprint(hex)
    }
}

/// Normalise a finding title for fingerprinting: lowercase, collapse
/// whitespace, and map well-known abbreviations onto their canonical names
/// so different tools reporting the same class of issue converge.
pub fn normalize_title(title: &str) -> String {
    let collapsed: String = title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    canonical_alias(&collapsed)
        .map(str::to_string)
        .unwrap_or(collapsed)
}

fn canonical_alias(normalized: &str) -> Option<&'static str> {
    // Alias table for the classes tools most often disagree on.
    const ALIASES: &[(&[&str], &str)] = &[
        (&["sqli", "sql injection"], "sql injection"),
        (&["xss", "cross-site scripting", "cross site scripting"], "cross-site scripting"),
        (&["rce", "remote code execution"], "remote code execution"),
        (&["ssrf", "server-side request forgery"], "server-side request forgery"),
        (&["lfi", "local file inclusion"], "local file inclusion"),
        (&["csrf", "cross-site request forgery"], "cross-site request forgery"),
        (&["idor", "insecure direct object reference"], "insecure direct object reference"),
        (&["xxe", "xml external entity"], "xml external entity"),
    ];
    for (variants, canonical) in ALIASES {
        if variants.contains(&normalized) {
            return Some(canonical);
        }
    }
    None
}

#[cfg(any(test, feature = "test-support"))]
impl Finding {
    /// Minimal finding for tests in other crates.
    pub fn stub(id: &str, title: &str, severity: Severity, source: &str) -> Self {
        Self {
            id: FindingId::new(id),
            title: title.to_string(),
            description: String::new(),
            severity,
            category: "test".to_string(),
            source: source.to_string(),
            target: FindingTarget::host("example.com"),
            evidence: Vec::new(),
            references: Vec::new(),
            tags: Vec::new(),
            remediation: None,
            confidence: 0.5,
            cwe_id: None,
            provenance: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "finding_tests.rs"]
mod tests;
