// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for `subfinder` (passive subdomain enumeration, plain-line output).

use crate::subprocess::{stream_lines, RunContext};
use crate::tool::{SubdomainEnumerator, ToolError, ToolSpec};
use async_trait::async_trait;
use pal_core::ToolsConfig;
use tokio::process::Command;

pub struct Subfinder {
    spec: ToolSpec,
}

impl Subfinder {
    pub const TOOL: &'static str = "subfinder";

    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            spec: ToolSpec::discover(Self::TOOL, config),
        }
    }
}

#[async_trait]
impl SubdomainEnumerator for Subfinder {
    async fn enumerate(&self, domain: &str, ctx: &RunContext) -> Result<Vec<String>, ToolError> {
        let binary = self.spec.binary()?;

        let mut cmd = Command::new(binary);
        cmd.arg("-d").arg(domain).arg("-silent");

        tracing::info!(tool = Self::TOOL, domain, "enumerating subdomains");

        let mut subdomains: Vec<String> = Vec::new();
        let outcome = stream_lines(cmd, ctx, Self::TOOL, |line| {
            let line = line.trim();
            if !line.is_empty() && !subdomains.iter().any(|s| s == line) {
                subdomains.push(line.to_string());
            }
        })
        .await
        .map_err(|e| ToolError::spawn(Self::TOOL, e))?;

        ToolError::check(Self::TOOL, outcome)?;
        tracing::info!(tool = Self::TOOL, domain, found = subdomains.len(), "enumeration done");
        Ok(subdomains)
    }
}
