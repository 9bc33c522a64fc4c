// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for `katana` (web crawling, plain-line URL output).

use crate::record::CrawlResult;
use crate::subprocess::{stream_lines, RunContext};
use crate::tool::{Crawler, ToolError, ToolSpec};
use async_trait::async_trait;
use pal_core::ToolsConfig;
use tokio::process::Command;

pub struct Katana {
    spec: ToolSpec,
}

impl Katana {
    pub const TOOL: &'static str = "katana";

    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            spec: ToolSpec::discover(Self::TOOL, config),
        }
    }
}

#[async_trait]
impl Crawler for Katana {
    async fn crawl(
        &self,
        url: &str,
        depth: u32,
        ctx: &RunContext,
    ) -> Result<CrawlResult, ToolError> {
        let binary = self.spec.binary()?;

        let mut cmd = Command::new(binary);
        cmd.arg("-u")
            .arg(url)
            .arg("-d")
            .arg(depth.to_string())
            .arg("-silent");

        tracing::info!(tool = Self::TOOL, url, depth, "crawling");

        let mut endpoints: Vec<String> = Vec::new();
        let outcome = stream_lines(cmd, ctx, Self::TOOL, |line| {
            let line = line.trim();
            if line.starts_with("http") && !endpoints.iter().any(|e| e == line) {
                endpoints.push(line.to_string());
            }
        })
        .await
        .map_err(|e| ToolError::spawn(Self::TOOL, e))?;

        ToolError::check(Self::TOOL, outcome)?;
        let result = CrawlResult::from_endpoints(endpoints);
        tracing::info!(
            tool = Self::TOOL,
            url,
            endpoints = result.endpoints.len(),
            parameters = result.parameters.len(),
            "crawl done"
        );
        Ok(result)
    }
}
