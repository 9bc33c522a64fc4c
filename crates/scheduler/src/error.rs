// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler error taxonomy: machine-readable reason codes plus human text.

use pal_core::{TaskId, TaskState};
use pal_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Target failed SSRF validation, was malformed, or is deny-listed.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// Unknown task-type, unsupported combination, or out-of-range value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Token bucket exhausted for this principal and operation class.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    /// Queue depth cap reached.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// Non-owner, non-admin access to another principal's task.
    #[error("forbidden")]
    Forbidden,
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// Cancel on a task already terminal.
    #[error("task {task_id} is not cancellable in state {state}")]
    NotCancellable { task_id: TaskId, state: TaskState },
    /// Restart/delete precondition failed.
    #[error("operation not valid for task {task_id} in state {state}")]
    InvalidState { task_id: TaskId, state: TaskState },
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SchedulerError {
    /// Stable reason code for transports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidTarget(_) => "INVALID_TARGET",
            SchedulerError::InvalidConfig(_) => "INVALID_CONFIG",
            SchedulerError::RateLimited { .. } => "RATE_LIMITED",
            SchedulerError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            SchedulerError::Forbidden => "FORBIDDEN",
            SchedulerError::NotFound(_) => "NOT_FOUND",
            SchedulerError::NotCancellable { .. } => "NOT_CANCELLABLE",
            SchedulerError::InvalidState { .. } => "INVALID_STATE",
            SchedulerError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
