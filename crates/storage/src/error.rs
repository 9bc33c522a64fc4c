// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error types

use pal_core::{TaskId, TaskState};
use thiserror::Error;

/// Errors surfaced by a [`crate::TaskStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("state conflict for task {task_id}: expected {expected}, found {actual}")]
    CasConflict {
        task_id: TaskId,
        expected: TaskState,
        actual: TaskState,
    },
    #[error("illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True for conflicts a caller can resolve by re-reading current state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::CasConflict { .. })
    }
}
