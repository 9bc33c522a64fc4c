// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events streamed to subscribers while tasks execute.

use crate::finding::{FindingId, Severity};
use crate::task::{TaskId, TaskState, TerminalReason};
use serde::{Deserialize, Serialize};

/// Events emitted by the scheduler and engine.
///
/// Serializes with `{"type": "task:progress", ...fields}` format. Delivery
/// is at-least-once and lossy per subscriber; progress events carry a
/// per-task monotonic sequence number so consumers can detect gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Incremental progress within a running task.
    #[serde(rename = "task:progress")]
    TaskProgress {
        task_id: TaskId,
        /// Monotonic per task; gaps are permitted, reorderings are not.
        seq: u64,
        phase: String,
        percent: u8,
        processed: u64,
        total: u64,
        ts_ms: u64,
    },

    /// A stage changed status.
    #[serde(rename = "task:stage")]
    TaskStage {
        task_id: TaskId,
        stage: String,
        status: String,
        ts_ms: u64,
    },

    /// A canonical finding was recorded for the task.
    #[serde(rename = "task:finding")]
    TaskFinding {
        task_id: TaskId,
        finding_id: FindingId,
        severity: Severity,
        title: String,
        source: String,
        ts_ms: u64,
    },

    /// The task reached a new lifecycle state. Terminal when
    /// `state.is_terminal()`.
    #[serde(rename = "task:state")]
    TaskStateChanged {
        task_id: TaskId,
        state: TaskState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<TerminalReason>,
        ts_ms: u64,
    },
}

impl Event {
    /// The task this event belongs to.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Event::TaskProgress { task_id, .. }
            | Event::TaskStage { task_id, .. }
            | Event::TaskFinding { task_id, .. }
            | Event::TaskStateChanged { task_id, .. } => task_id,
        }
    }

    /// Sequence number, for events that carry one.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Event::TaskProgress { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// True for the event that closes a task's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::TaskStateChanged { state, .. } if state.is_terminal())
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TaskProgress { .. } => "task:progress",
            Event::TaskStage { .. } => "task:stage",
            Event::TaskFinding { .. } => "task:finding",
            Event::TaskStateChanged { .. } => "task:state",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
