// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for `nuclei` (template-driven vulnerability scanning, JSON-line
//! output).

use crate::subprocess::{stream_lines, RunContext};
use crate::tool::{TemplateScanner, ToolError, ToolSpec};
use async_trait::async_trait;
use pal_core::{Finding, FindingId, FindingTarget, IdGen, Severity, ToolOptions, ToolsConfig, UuidIdGen};
use serde::Deserialize;
use tokio::process::Command;

/// Stage id used as finding source / merge provenance.
pub const SOURCE: &str = "template-scan";

pub struct Nuclei {
    spec: ToolSpec,
}

impl Nuclei {
    pub const TOOL: &'static str = "nuclei";

    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            spec: ToolSpec::discover(Self::TOOL, config),
        }
    }
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "template-id")]
    template_id: String,
    #[serde(default)]
    info: RawInfo,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "matched-at", default)]
    matched_at: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    reference: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    tags: Vec<String>,
    #[serde(default)]
    classification: Option<RawClassification>,
}

#[derive(Deserialize, Default)]
struct RawClassification {
    #[serde(rename = "cwe-id", default, deserialize_with = "string_or_seq")]
    cwe_id: Vec<String>,
}

/// nuclei emits `reference`/`tags`/`cwe-id` as either a string, a
/// comma-joined string, or an array, depending on the template.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Parse one nuclei JSON line into a [`Finding`]; `None` for noise lines.
pub fn parse_finding_line(line: &str, fallback_host: &str) -> Option<Finding> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let raw: RawHit = serde_json::from_str(line).ok()?;

    let host = raw
        .host
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| fallback_host.to_string());
    let path = raw.path.or(raw.matched_at.clone()).filter(|p| !p.is_empty());
    let target = FindingTarget {
        host: strip_scheme(&host),
        port: None,
        path: path.map(|p| path_of(&p)),
    };

    let cwe_id = raw
        .info
        .classification
        .as_ref()
        .and_then(|c| c.cwe_id.first())
        .and_then(|c| c.trim_start_matches("CWE-").parse().ok());

    let mut references = raw.info.reference;
    if let Some(cwe) = cwe_id {
        let tag = format!("CWE-{}", cwe);
        if !references.contains(&tag) {
            references.push(tag);
        }
    }

    Some(Finding {
        id: FindingId::new(UuidIdGen.next()),
        title: raw
            .info
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| raw.template_id.clone()),
        description: raw.info.description.unwrap_or_default(),
        severity: Severity::parse(raw.info.severity.as_deref().unwrap_or("unknown")),
        category: raw.kind.unwrap_or_else(|| "template".to_string()),
        source: SOURCE.to_string(),
        target,
        evidence: raw
            .matched_at
            .map(|m| {
                vec![pal_core::Evidence {
                    source: SOURCE.to_string(),
                    content: m,
                }]
            })
            .unwrap_or_default(),
        references,
        tags: raw.info.tags,
        remediation: None,
        confidence: 0.9,
        cwe_id,
        provenance: Vec::new(),
    })
}

fn strip_scheme(host: &str) -> String {
    let stripped = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    stripped
        .split(['/', '?'])
        .next()
        .unwrap_or(stripped)
        .split(':')
        .next()
        .unwrap_or(stripped)
        .to_string()
}

/// Reduce a matched-at URL to its path component for stable fingerprints.
fn path_of(matched: &str) -> String {
    match matched.split_once("://") {
        Some((_, rest)) => match rest.split_once('/') {
            Some((_, path)) => format!("/{}", path.split('?').next().unwrap_or(path)),
            None => "/".to_string(),
        },
        None => matched.split('?').next().unwrap_or(matched).to_string(),
    }
}

#[async_trait]
impl TemplateScanner for Nuclei {
    async fn scan(
        &self,
        url: &str,
        options: &ToolOptions,
        ctx: &RunContext,
    ) -> Result<Vec<Finding>, ToolError> {
        let binary = self.spec.binary()?;

        let mut cmd = Command::new(binary);
        cmd.arg("-u").arg(url).arg("-jsonl").arg("-silent");
        if let Some(severity) = &options.template_severity {
            cmd.arg("-severity").arg(severity);
        }
        if let Some(tags) = &options.template_tags {
            cmd.arg("-tags").arg(tags);
        }

        tracing::info!(tool = Self::TOOL, url, "running template scan");

        let fallback_host = url.to_string();
        let mut findings: Vec<Finding> = Vec::new();
        let outcome = stream_lines(cmd, ctx, Self::TOOL, |line| {
            match parse_finding_line(line, &fallback_host) {
                Some(finding) => findings.push(finding),
                None => {
                    if !line.trim().is_empty() {
                        tracing::warn!(tool = Self::TOOL, line = line.trim(), "unparseable output line");
                    }
                }
            }
        })
        .await
        .map_err(|e| ToolError::spawn(Self::TOOL, e))?;

        // nuclei exits 1 when templates matched; output decides success.
        let exited_with_hits = matches!(outcome, crate::subprocess::StreamOutcome::Exited { .. })
            && !findings.is_empty();
        if !exited_with_hits {
            ToolError::check(Self::TOOL, outcome)?;
        }

        tracing::info!(tool = Self::TOOL, url, findings = findings.len(), "template scan done");
        Ok(findings)
    }
}

#[cfg(test)]
#[path = "nuclei_tests.rs"]
mod tests;
