// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool discovery and the capability traits the engine consumes.

use crate::record::{CrawlResult, HttpProbe, OpenPort};
use crate::subprocess::RunContext;
use async_trait::async_trait;
use pal_core::{Finding, ToolOptions, ToolsConfig};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Binary not present under the discovery root. Stages report SKIPPED.
    #[error("tool not installed: {0}")]
    Missing(String),
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} timed out")]
    Timeout { tool: String },
    #[error("{tool} cancelled")]
    Cancelled { tool: String },
    #[error("{tool} exited with code {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ToolError {
    /// Map a finished stream to the adapter result. Success is exit code 0.
    pub fn check(tool: &'static str, outcome: crate::subprocess::StreamOutcome) -> Result<(), ToolError> {
        use crate::subprocess::StreamOutcome;
        match outcome {
            StreamOutcome::Exited { code: Some(0), .. } => Ok(()),
            StreamOutcome::Exited { code, stderr } => Err(ToolError::Failed {
                tool: tool.to_string(),
                code,
                stderr,
            }),
            StreamOutcome::TimedOut => Err(ToolError::Timeout {
                tool: tool.to_string(),
            }),
            StreamOutcome::Cancelled => Err(ToolError::Cancelled {
                tool: tool.to_string(),
            }),
        }
    }

    /// Wrap a spawn failure.
    pub fn spawn(tool: &'static str, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            tool: tool.to_string(),
            source,
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            ToolError::Missing(tool) => tool,
            ToolError::Spawn { tool, .. }
            | ToolError::Timeout { tool }
            | ToolError::Cancelled { tool }
            | ToolError::Failed { tool, .. } => tool,
        }
    }
}

/// Resolved description of one external tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub id: &'static str,
    /// Absolute path to the binary; `None` when not discovered.
    pub binary: Option<PathBuf>,
}

impl ToolSpec {
    /// Discover `<root>/<tool>/<tool>`, the layout the deployment uses.
    pub fn discover(id: &'static str, config: &ToolsConfig) -> Self {
        let candidate = config.discovery_root.join(id).join(id);
        let binary = candidate.is_file().then_some(candidate);
        if binary.is_none() {
            tracing::warn!(tool = id, root = %config.discovery_root.display(), "tool not found");
        }
        Self { id, binary }
    }

    pub fn available(&self) -> bool {
        self.binary.is_some()
    }

    /// The binary path, or `Missing` for absent tools.
    pub fn binary(&self) -> Result<&PathBuf, ToolError> {
        self.binary
            .as_ref()
            .ok_or_else(|| ToolError::Missing(self.id.to_string()))
    }
}

/// Subdomain enumeration (stage `subdomain-enum`).
#[async_trait]
pub trait SubdomainEnumerator: Send + Sync {
    async fn enumerate(&self, domain: &str, ctx: &RunContext) -> Result<Vec<String>, ToolError>;
}

/// HTTP liveness probing over candidate hosts (stage `liveness-check`).
#[async_trait]
pub trait LivenessProber: Send + Sync {
    async fn probe(&self, hosts: &[String], ctx: &RunContext)
        -> Result<Vec<HttpProbe>, ToolError>;
}

/// Port scanning (stage `port-probe`).
#[async_trait]
pub trait PortScanner: Send + Sync {
    async fn scan(
        &self,
        host: &str,
        port_range: &str,
        ctx: &RunContext,
    ) -> Result<Vec<OpenPort>, ToolError>;
}

/// Template-driven vulnerability scanning (stage `template-scan`).
#[async_trait]
pub trait TemplateScanner: Send + Sync {
    async fn scan(
        &self,
        url: &str,
        options: &ToolOptions,
        ctx: &RunContext,
    ) -> Result<Vec<Finding>, ToolError>;
}

/// Web technology detection (stage `tech-detect`).
#[async_trait]
pub trait TechDetector: Send + Sync {
    async fn detect(&self, url: &str, ctx: &RunContext) -> Result<HttpProbe, ToolError>;
}

/// Website crawling (stage `crawl`).
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(
        &self,
        url: &str,
        depth: u32,
        ctx: &RunContext,
    ) -> Result<CrawlResult, ToolError>;
}

/// The full set of tool capabilities the engine draws from.
#[derive(Clone)]
pub struct Toolkit {
    pub subdomains: Arc<dyn SubdomainEnumerator>,
    pub liveness: Arc<dyn LivenessProber>,
    pub ports: Arc<dyn PortScanner>,
    pub templates: Arc<dyn TemplateScanner>,
    pub tech: Arc<dyn TechDetector>,
    pub crawler: Arc<dyn Crawler>,
}

impl Toolkit {
    /// Wire the production adapters from the tool discovery config.
    pub fn discover(config: &ToolsConfig) -> Self {
        let httpx = Arc::new(crate::httpx::Httpx::discover(config));
        Self {
            subdomains: Arc::new(crate::subfinder::Subfinder::discover(config)),
            liveness: httpx.clone(),
            ports: Arc::new(crate::naabu::Naabu::discover(config)),
            templates: Arc::new(crate::nuclei::Nuclei::discover(config)),
            tech: httpx,
            crawler: Arc::new(crate::katana::Katana::discover(config)),
        }
    }
}
