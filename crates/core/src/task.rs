// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan task definition and lifecycle state machine.

use crate::clock::Clock;
use crate::target::Target;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a scan task.
    ///
    /// Every submission mints a fresh ID; restarts mint a new ID linked to
    /// the original through `parent_task_id`.
    #[derive(Default)]
    pub struct TaskId;
}

/// What kind of scan a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    PortScan,
    SubdomainEnum,
    VulnerabilityScan,
    WebDiscovery,
    Comprehensive,
    ApiSecurity,
}

impl TaskType {
    /// Parse a submission string; `None` for unrecognised types.
    pub fn parse(raw: &str) -> Option<TaskType> {
        match raw {
            "port_scan" => Some(TaskType::PortScan),
            "subdomain_enum" => Some(TaskType::SubdomainEnum),
            "vulnerability_scan" => Some(TaskType::VulnerabilityScan),
            "web_discovery" => Some(TaskType::WebDiscovery),
            "comprehensive" => Some(TaskType::Comprehensive),
            "api_security" => Some(TaskType::ApiSecurity),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::PortScan => "port_scan",
            TaskType::SubdomainEnum => "subdomain_enum",
            TaskType::VulnerabilityScan => "vulnerability_scan",
            TaskType::WebDiscovery => "web_discovery",
            TaskType::Comprehensive => "comprehensive",
            TaskType::ApiSecurity => "api_security",
        };
        write!(f, "{}", s)
    }
}

/// Dispatch priority. Ordering is ascending so `Urgent` compares greatest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{}", s)
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Whether a transition from `self` to `to` follows the lifecycle graph.
    ///
    /// `Running -> Pending` is the recovery edge: a RUNNING task whose worker
    /// binding was lost across a restart is re-queued without losing its
    /// retry budget.
    pub fn can_transition(&self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Cancelling)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelling)
                | (Running, Pending)
                | (Cancelling, Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Cancelling => "cancelling",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Why a task reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalReason {
    UserCancel,
    Timeout,
    Error,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalReason::UserCancel => "USER_CANCEL",
            TerminalReason::Timeout => "TIMEOUT",
            TerminalReason::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Per-stage execution status recorded on the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
    Skipped,
}

impl StageState {
    pub fn is_failure(&self) -> bool {
        matches!(self, StageState::Failed | StageState::TimedOut)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
            StageState::TimedOut => "timed_out",
            StageState::Cancelled => "cancelled",
            StageState::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// When a task should run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Schedule {
    #[default]
    Immediate,
    At {
        epoch_ms: u64,
    },
    /// Re-dispatched on a fixed interval ("30m", "6h", "24h").
    Recurring {
        interval: String,
    },
}

/// Retry behaviour for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 30_000,
        }
    }
}

/// Target-level progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed_targets: u64,
    pub total_targets: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub percent: u8,
}

impl Progress {
    pub fn with_total(total: u64) -> Self {
        Self {
            total_targets: total,
            ..Self::default()
        }
    }

    /// Record one processed target, clamped so `processed <= total`.
    pub fn record(&mut self, success: bool) {
        if self.processed_targets < self.total_targets {
            self.processed_targets += 1;
        }
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn set_percent(&mut self, percent: u8) {
        self.percent = percent.min(100);
    }
}

/// Per-task tool options, with an escape hatch for adapter-specific knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOptions {
    /// Port range handed to the port-probe stage, e.g. `"80,443,8080"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    /// Crawl depth for the web crawler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_depth: Option<u32>,
    /// Template severity filter (`"critical,high"`) for the template scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_severity: Option<String>,
    /// Template tag filter (`"cve"`, `"exposure"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_tags: Option<String>,
    /// Keep endpoints that answered 404 in api-security output.
    #[serde(default)]
    pub keep_not_found_endpoints: bool,
    /// Unmodelled adapter options pass through untyped.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The validated definition a task is created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    pub targets: Vec<Target>,
    #[serde(default)]
    pub options: ToolOptions,
    #[serde(default)]
    pub schedule: Schedule,
    pub max_execution_time_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl TaskSpec {
    pub fn builder(name: impl Into<String>, task_type: TaskType) -> TaskSpecBuilder {
        TaskSpecBuilder::new(name, task_type)
    }
}

/// Builder for [`TaskSpec`].
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(name: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            spec: TaskSpec {
                name: name.into(),
                description: String::new(),
                task_type,
                priority: Priority::default(),
                targets: Vec::new(),
                options: ToolOptions::default(),
                schedule: Schedule::default(),
                max_execution_time_ms: 3_600_000,
                retry: RetryPolicy::default(),
            },
        }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.spec.description = d.into();
        self
    }

    pub fn priority(mut self, p: Priority) -> Self {
        self.spec.priority = p;
        self
    }

    pub fn target(mut self, t: Target) -> Self {
        self.spec.targets.push(t);
        self
    }

    pub fn targets(mut self, ts: impl IntoIterator<Item = Target>) -> Self {
        self.spec.targets.extend(ts);
        self
    }

    pub fn options(mut self, o: ToolOptions) -> Self {
        self.spec.options = o;
        self
    }

    pub fn schedule(mut self, s: Schedule) -> Self {
        self.spec.schedule = s;
        self
    }

    pub fn max_execution_time_ms(mut self, ms: u64) -> Self {
        self.spec.max_execution_time_ms = ms;
        self
    }

    pub fn retry(mut self, r: RetryPolicy) -> Self {
        self.spec.retry = r;
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// A scan task instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTask {
    pub id: TaskId,
    /// Principal that created the task; ownership checks key off this.
    pub created_by: String,
    pub spec: TaskSpec,
    pub state: TaskState,
    pub progress: Progress,
    /// Execution status per stage, in plan order.
    #[serde(default)]
    pub stage_status: IndexMap<String, StageState>,
    /// One human-readable entry per contributing failure cause.
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminalReason>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Lineage: the task this one was restarted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    /// Lineage: tasks restarted or cloned from this one.
    #[serde(default)]
    pub child_task_ids: Vec<TaskId>,
}

impl ScanTask {
    /// Create a PENDING task from a validated spec.
    pub fn new(id: TaskId, created_by: impl Into<String>, spec: TaskSpec, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        let total = spec.targets.len() as u64;
        Self {
            id,
            created_by: created_by.into(),
            spec,
            state: TaskState::Pending,
            progress: Progress::with_total(total),
            stage_status: IndexMap::new(),
            error_messages: Vec::new(),
            reason: None,
            retry_count: 0,
            created_at_ms: now,
            updated_at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            parent_task_id: None,
            child_task_ids: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a lifecycle transition, maintaining the timestamp invariants:
    /// `started_at` set on entering RUNNING, `completed_at` set iff terminal.
    pub fn transition(&mut self, to: TaskState, clock: &impl Clock) {
        self.transition_at(to, clock.epoch_ms());
    }

    /// [`ScanTask::transition`] with an explicit timestamp, for stores that
    /// receive `now_ms` from their caller.
    pub fn transition_at(&mut self, to: TaskState, now: u64) {
        if to == TaskState::Running && self.started_at_ms.is_none() {
            self.started_at_ms = Some(now);
        }
        if to.is_terminal() {
            self.completed_at_ms = Some(now);
            if to == TaskState::Completed {
                self.progress.set_percent(100);
            }
        }
        self.state = to;
        self.updated_at_ms = now;
    }

    /// Wall-clock duration, if the task has started.
    pub fn duration_ms(&self, clock: &impl Clock) -> Option<u64> {
        let start = self.started_at_ms?;
        let end = self.completed_at_ms.unwrap_or_else(|| clock.epoch_ms());
        Some(end.saturating_sub(start))
    }

    /// Record a stage's status in plan order.
    pub fn record_stage(&mut self, stage: &str, state: StageState) {
        self.stage_status.insert(stage.to_string(), state);
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.error_messages.push(message.into());
    }

    /// Reset execution state for re-queueing (recovery or restart child).
    pub fn reset_for_requeue(&mut self, clock: &impl Clock) {
        self.state = TaskState::Pending;
        self.progress = Progress::with_total(self.spec.targets.len() as u64);
        self.stage_status.clear();
        self.error_messages.clear();
        self.reason = None;
        self.started_at_ms = None;
        self.completed_at_ms = None;
        self.updated_at_ms = clock.epoch_ms();
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
