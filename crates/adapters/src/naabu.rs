// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for `naabu` (port scanning, `host:port` line output).

use crate::record::OpenPort;
use crate::subprocess::{stream_lines, RunContext};
use crate::tool::{PortScanner, ToolError, ToolSpec};
use async_trait::async_trait;
use pal_core::ToolsConfig;
use tokio::process::Command;

pub struct Naabu {
    spec: ToolSpec,
}

impl Naabu {
    pub const TOOL: &'static str = "naabu";

    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            spec: ToolSpec::discover(Self::TOOL, config),
        }
    }
}

/// Parse one `host:port` output line. IPv6 hosts keep their colons; the
/// port is whatever follows the last one.
pub fn parse_port_line(line: &str) -> Option<OpenPort> {
    let line = line.trim();
    let (host, port) = line.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() {
        return None;
    }
    Some(OpenPort {
        host: host.trim_matches(['[', ']']).to_string(),
        port,
    })
}

#[async_trait]
impl PortScanner for Naabu {
    async fn scan(
        &self,
        host: &str,
        port_range: &str,
        ctx: &RunContext,
    ) -> Result<Vec<OpenPort>, ToolError> {
        let binary = self.spec.binary()?;

        let mut cmd = Command::new(binary);
        cmd.arg("-host")
            .arg(host)
            .arg("-p")
            .arg(port_range)
            .arg("-silent");

        tracing::info!(tool = Self::TOOL, host, port_range, "scanning ports");

        let mut ports: Vec<OpenPort> = Vec::new();
        let outcome = stream_lines(cmd, ctx, Self::TOOL, |line| {
            if let Some(open) = parse_port_line(line) {
                if !ports.contains(&open) {
                    ports.push(open);
                }
            }
        })
        .await
        .map_err(|e| ToolError::spawn(Self::TOOL, e))?;

        ToolError::check(Self::TOOL, outcome)?;
        tracing::info!(tool = Self::TOOL, host, open = ports.len(), "port scan done");
        Ok(ports)
    }
}
