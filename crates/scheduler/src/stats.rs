// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate task statistics.

use pal_core::ScanTask;
use serde::Serialize;
use std::collections::HashMap;

/// Counts by state, type, and priority, plus average execution time over
/// completed tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub by_state: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    pub by_priority: HashMap<String, usize>,
    /// Mean wall-clock duration of completed tasks, `None` when none have
    /// completed.
    pub avg_execution_time_ms: Option<u64>,
}

impl TaskStats {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a ScanTask>) -> Self {
        let mut stats = TaskStats::default();
        let mut completed_durations: Vec<u64> = Vec::new();

        for task in tasks {
            stats.total += 1;
            *stats.by_state.entry(task.state.to_string()).or_insert(0) += 1;
            *stats
                .by_type
                .entry(task.spec.task_type.to_string())
                .or_insert(0) += 1;
            *stats
                .by_priority
                .entry(task.spec.priority.to_string())
                .or_insert(0) += 1;

            if task.state == pal_core::TaskState::Completed {
                if let (Some(start), Some(end)) = (task.started_at_ms, task.completed_at_ms) {
                    completed_durations.push(end.saturating_sub(start));
                }
            }
        }

        if !completed_durations.is_empty() {
            let sum: u64 = completed_durations.iter().sum();
            stats.avg_execution_time_ms = Some(sum / completed_durations.len() as u64);
        }
        stats
    }
}
