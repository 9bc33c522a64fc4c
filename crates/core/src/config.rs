// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration for the orchestration core.
//!
//! Every knob carries its documented default, so `Config::default()` is a
//! fully working configuration; a TOML file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub engine: EngineConfig,
    pub api_security: ApiSecurityConfig,
    pub ssrf: SsrfConfig,
    pub merger: MergerConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Load from a TOML file, filling unspecified fields with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Scheduler: worker pool, admission, retry, cancellation deadlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    /// Global cap on concurrently executing tool subprocesses.
    pub inflight_cap: usize,
    /// Queue depth cap; submissions beyond it are rejected with
    /// QuotaExceeded.
    pub max_queued_tasks: usize,
    pub rate_limits: RateLimitConfig,
    /// Bounds on a submission's `max_execution_time_ms`.
    pub min_execution_time_ms: u64,
    pub max_execution_time_ms: u64,
    pub retry: RetryConfig,
    /// Grace between terminate and kill when cancelling subprocesses.
    pub cancel_grace_ms: u64,
    /// After this, an unacknowledged cancel force-transitions the task.
    pub cancel_hard_deadline_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            inflight_cap: 64,
            max_queued_tasks: 256,
            rate_limits: RateLimitConfig::default(),
            min_execution_time_ms: 1_000,
            max_execution_time_ms: 24 * 3_600_000,
            retry: RetryConfig::default(),
            cancel_grace_ms: 5_000,
            cancel_hard_deadline_ms: 60_000,
        }
    }
}

/// Token-bucket admission limits per principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Scan creations allowed per principal per window.
    pub scan_create_limit: u32,
    pub scan_create_window_ms: u64,
    /// Control operations (cancel/restart/clone) per principal per window.
    pub control_limit: u32,
    pub control_window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            scan_create_limit: 5,
            scan_create_window_ms: 60_000,
            control_limit: 30,
            control_window_ms: 60_000,
        }
    }
}

/// Retry classification for worker-reported failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Tool exit codes treated as transient.
    pub retryable_exit_codes: Vec<i32>,
    pub default_max_retries: u32,
    pub default_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            // 1 = generic tool failure that commonly clears on retry,
            // 137/143 = killed/terminated (resource pressure)
            retryable_exit_codes: vec![1, 137, 143],
            default_max_retries: 3,
            default_retry_delay_ms: 30_000,
        }
    }
}

/// Scanner engine: stage concurrency and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_subprocesses_per_task: usize,
    /// Bounded concurrency when a stage fans out over many targets.
    pub per_stage_target_concurrency: usize,
    pub stage_timeouts: StageTimeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_subprocesses_per_task: 4,
            per_stage_target_concurrency: 10,
            stage_timeouts: StageTimeouts::default(),
        }
    }
}

/// Per-stage subprocess timeouts (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub subdomain_enum_s: u64,
    pub liveness_check_s: u64,
    pub port_probe_s: u64,
    pub template_scan_s: u64,
    pub pattern_scan_s: u64,
    pub tech_detect_s: u64,
    pub crawl_s: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            subdomain_enum_s: 300,
            liveness_check_s: 120,
            port_probe_s: 600,
            template_scan_s: 900,
            pattern_scan_s: 120,
            tech_detect_s: 60,
            crawl_s: 600,
        }
    }
}

/// API-security pipeline limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSecurityConfig {
    pub max_concurrent_requests: usize,
    pub max_js_files: usize,
    pub http_timeout_s: u64,
    /// Endpoints probed in the unauthorized/sensitive phases, per task.
    pub max_probed_endpoints: usize,
}

impl Default for ApiSecurityConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            max_js_files: 100,
            http_timeout_s: 30,
            max_probed_endpoints: 50,
        }
    }
}

/// SSRF-safe URL admission policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrfConfig {
    pub allowed_schemes: Vec<String>,
    pub allowed_ports: Vec<u16>,
    pub host_denylist: Vec<String>,
    pub dns_timeout_s: u64,
}

impl Default for SsrfConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            allowed_ports: vec![80, 443, 8000, 8080, 8443],
            host_denylist: Vec::new(),
            dns_timeout_s: 5,
        }
    }
}

/// Finding-merge behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    pub evidence_cap_per_source: usize,
    /// Sources whose remediation text wins, most preferred first.
    pub remediation_priority: Vec<String>,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            evidence_cap_per_source: 5,
            remediation_priority: vec![
                "pattern-scan".to_string(),
                "template-scan".to_string(),
                "header-scan".to_string(),
            ],
        }
    }
}

/// Tool discovery and per-tool overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root under which tool binaries are discovered (`<root>/<tool>/<tool>`).
    pub discovery_root: PathBuf,
    /// Per-tool overrides keyed by tool id; values pass through untyped so
    /// adapters own their interpretation.
    pub overrides: HashMap<String, toml::Value>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            discovery_root: PathBuf::from("tools"),
            overrides: HashMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
