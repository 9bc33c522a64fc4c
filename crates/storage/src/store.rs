// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `TaskStore` trait: everything the core persists.

use crate::error::StoreError;
use crate::filter::{Page, TaskFilter};
use pal_core::{
    ApiEndpoint, ApiSecurityIssue, Finding, JsResource, Microservice, ScanTask, TaskId, TaskState,
};
use serde::{Deserialize, Serialize};

/// Lifecycle mutations recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Submit,
    Cancel,
    Restart,
    Clone,
    Delete,
    StateChange,
}

/// One audit entry per lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub task_id: TaskId,
    pub principal: String,
    pub action: AuditAction,
    #[serde(default)]
    pub detail: String,
    pub at_ms: u64,
}

/// Durable state of scan tasks and their artefacts.
///
/// Implementations must make `update_state` a linearisation point: two
/// concurrent callers racing a transition see exactly one winner, the loser
/// gets `CasConflict`. Every method is synchronous; callers in async
/// contexts treat the store as a short critical section, as the engine does
/// with its materialised state.
pub trait TaskStore: Send + Sync {
    // --- tasks ---

    /// Insert or fully replace a task record.
    fn put_task(&self, task: ScanTask) -> Result<(), StoreError>;

    fn get_task(&self, id: &TaskId) -> Result<ScanTask, StoreError>;

    /// Compare-and-set state transition. Fails with `CasConflict` when the
    /// stored state is not `from`, and with `IllegalTransition` when the
    /// edge is not part of the lifecycle graph
    /// ([`TaskState::can_transition`]). On success the stored task's
    /// timestamps are updated (`started_at` on entering RUNNING,
    /// `completed_at` on terminal states) using `now_ms`.
    fn update_state(
        &self,
        id: &TaskId,
        from: TaskState,
        to: TaskState,
        now_ms: u64,
    ) -> Result<ScanTask, StoreError>;

    /// List tasks matching `filter`, ordered `created_at` descending, with
    /// opaque monotonic cursor pagination.
    fn list_tasks(
        &self,
        filter: &TaskFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<ScanTask>, StoreError>;

    /// Delete a task and cascade to findings, js resources, endpoints,
    /// microservices, issues, and audit entries.
    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError>;

    // --- findings ---

    fn append_findings(&self, task_id: &TaskId, findings: Vec<Finding>) -> Result<(), StoreError>;

    fn findings(&self, task_id: &TaskId) -> Result<Vec<Finding>, StoreError>;

    /// Drop all findings for a task (restart support).
    fn clear_findings(&self, task_id: &TaskId) -> Result<(), StoreError>;

    // --- api-security artefacts ---

    fn put_js_resources(
        &self,
        task_id: &TaskId,
        resources: Vec<JsResource>,
    ) -> Result<(), StoreError>;

    fn js_resources(&self, task_id: &TaskId) -> Result<Vec<JsResource>, StoreError>;

    fn put_api_endpoints(
        &self,
        task_id: &TaskId,
        endpoints: Vec<ApiEndpoint>,
    ) -> Result<(), StoreError>;

    fn api_endpoints(&self, task_id: &TaskId) -> Result<Vec<ApiEndpoint>, StoreError>;

    fn put_microservices(
        &self,
        task_id: &TaskId,
        services: Vec<Microservice>,
    ) -> Result<(), StoreError>;

    fn microservices(&self, task_id: &TaskId) -> Result<Vec<Microservice>, StoreError>;

    fn append_issues(
        &self,
        task_id: &TaskId,
        issues: Vec<ApiSecurityIssue>,
    ) -> Result<(), StoreError>;

    fn issues(&self, task_id: &TaskId) -> Result<Vec<ApiSecurityIssue>, StoreError>;

    // --- audit ---

    fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError>;

    fn audit(&self, task_id: &TaskId) -> Result<Vec<AuditRecord>, StoreError>;
}
