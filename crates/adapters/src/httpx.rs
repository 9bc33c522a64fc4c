// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for `httpx` (HTTP probing and technology detection, JSON-line
//! output). Serves both the liveness-check and tech-detect stages.

use crate::record::HttpProbe;
use crate::subprocess::{stream_lines, RunContext};
use crate::tool::{LivenessProber, TechDetector, ToolError, ToolSpec};
use async_trait::async_trait;
use pal_core::ToolsConfig;
use serde::Deserialize;
use tokio::process::Command;

pub struct Httpx {
    spec: ToolSpec,
}

impl Httpx {
    pub const TOOL: &'static str = "httpx";

    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            spec: ToolSpec::discover(Self::TOOL, config),
        }
    }

    async fn run_probe(&self, targets: &str, ctx: &RunContext) -> Result<Vec<HttpProbe>, ToolError> {
        let binary = self.spec.binary()?;

        let mut cmd = Command::new(binary);
        cmd.arg("-u")
            .arg(targets)
            .arg("-status-code")
            .arg("-title")
            .arg("-web-server")
            .arg("-tech-detect")
            .arg("-json")
            .arg("-silent");

        let mut probes: Vec<HttpProbe> = Vec::new();
        let outcome = stream_lines(cmd, ctx, Self::TOOL, |line| {
            if let Some(probe) = parse_probe_line(line) {
                probes.push(probe);
            }
        })
        .await
        .map_err(|e| ToolError::spawn(Self::TOOL, e))?;

        ToolError::check(Self::TOOL, outcome)?;
        Ok(probes)
    }
}

/// httpx JSON-line record; field spellings changed across releases, so the
/// hyphenated aliases are accepted too.
#[derive(Deserialize)]
struct RawProbe {
    url: String,
    #[serde(default, alias = "status-code")]
    status_code: Option<u16>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "web-server")]
    webserver: Option<String>,
    #[serde(default, alias = "technologies")]
    tech: Vec<String>,
}

/// Parse one httpx JSON line; `None` for unparseable lines (banner noise).
pub fn parse_probe_line(line: &str) -> Option<HttpProbe> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let raw: RawProbe = serde_json::from_str(line).ok()?;
    Some(HttpProbe {
        url: raw.url,
        status_code: raw.status_code,
        title: raw.title,
        webserver: raw.webserver,
        technologies: raw.tech,
    })
}

#[async_trait]
impl LivenessProber for Httpx {
    async fn probe(
        &self,
        hosts: &[String],
        ctx: &RunContext,
    ) -> Result<Vec<HttpProbe>, ToolError> {
        if hosts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(tool = Self::TOOL, hosts = hosts.len(), "probing liveness");
        let probes = self.run_probe(&hosts.join(","), ctx).await?;
        tracing::info!(tool = Self::TOOL, live = probes.len(), "liveness done");
        Ok(probes)
    }
}

#[async_trait]
impl TechDetector for Httpx {
    async fn detect(&self, url: &str, ctx: &RunContext) -> Result<HttpProbe, ToolError> {
        tracing::info!(tool = Self::TOOL, url, "detecting technologies");
        let probes = self.run_probe(url, ctx).await?;
        Ok(probes.into_iter().next().unwrap_or(HttpProbe {
            url: url.to_string(),
            ..HttpProbe::default()
        }))
    }
}
