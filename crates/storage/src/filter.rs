// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task list filtering and cursor pagination.

use pal_core::{Priority, ScanTask, TaskState, TaskType};
use serde::{Deserialize, Serialize};

/// Filter applied by `TaskStore::list_tasks`. Empty vectors match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Restrict to tasks created by this principal (non-admin listings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub states: Vec<TaskState>,
    #[serde(default)]
    pub task_types: Vec<TaskType>,
    #[serde(default)]
    pub priorities: Vec<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before_ms: Option<u64>,
}

impl TaskFilter {
    pub fn matches(&self, task: &ScanTask) -> bool {
        if let Some(owner) = &self.created_by {
            if &task.created_by != owner {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&task.state) {
            return false;
        }
        if !self.task_types.is_empty() && !self.task_types.contains(&task.spec.task_type) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.spec.priority) {
            return false;
        }
        if let Some(after) = self.created_after_ms {
            if task.created_at_ms < after {
                return false;
            }
        }
        if let Some(before) = self.created_before_ms {
            if task.created_at_ms > before {
                return false;
            }
        }
        true
    }
}

/// One page of list results, ordered `created_at` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matches irrespective of pagination.
    pub total: usize,
    /// Opaque cursor for the next page; `None` when exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Cursor encoding: `<created_at_ms>:<task_id>` of the last returned row.
/// Monotonic because listing orders by `(created_at desc, id desc)`.
pub(crate) fn encode_cursor(created_at_ms: u64, id: &str) -> String {
    format!("{}:{}", created_at_ms, id)
}

pub(crate) fn decode_cursor(cursor: &str) -> Option<(u64, String)> {
    let (ms, id) = cursor.split_once(':')?;
    let ms = ms.parse().ok()?;
    if id.is_empty() {
        return None;
    }
    Some((ms, id.to_string()))
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
