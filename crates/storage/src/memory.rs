// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementation of [`TaskStore`].

use crate::error::StoreError;
use crate::filter::{decode_cursor, encode_cursor, Page, TaskFilter};
use crate::store::{AuditRecord, TaskStore};
use pal_core::{
    ApiEndpoint, ApiSecurityIssue, Finding, JsResource, Microservice, ScanTask, TaskId, TaskState,
};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Tables {
    tasks: HashMap<TaskId, ScanTask>,
    findings: HashMap<TaskId, Vec<Finding>>,
    js_resources: HashMap<TaskId, Vec<JsResource>>,
    api_endpoints: HashMap<TaskId, Vec<ApiEndpoint>>,
    microservices: HashMap<TaskId, Vec<Microservice>>,
    issues: HashMap<TaskId, Vec<ApiSecurityIssue>>,
    audit: HashMap<TaskId, Vec<AuditRecord>>,
}

/// A `TaskStore` backed by in-process maps behind one RwLock.
///
/// All mutations take the write lock, so state transitions are trivially
/// linearised; the CAS check happens under the same lock as the write.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks (test/diagnostic helper).
    pub fn task_count(&self) -> usize {
        self.tables.read().tasks.len()
    }
}

impl TaskStore for MemoryStore {
    fn put_task(&self, task: ScanTask) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> Result<ScanTask, StoreError> {
        self.tables
            .read()
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn update_state(
        &self,
        id: &TaskId,
        from: TaskState,
        to: TaskState,
        now_ms: u64,
    ) -> Result<ScanTask, StoreError> {
        let mut tables = self.tables.write();
        let task = tables
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if task.state != from {
            return Err(StoreError::CasConflict {
                task_id: id.clone(),
                expected: from,
                actual: task.state,
            });
        }
        if !from.can_transition(to) {
            return Err(StoreError::IllegalTransition {
                task_id: id.clone(),
                from,
                to,
            });
        }
        task.transition_at(to, now_ms);
        tracing::debug!(task_id = %id, %from, %to, "state transition");
        Ok(task.clone())
    }

    fn list_tasks(
        &self,
        filter: &TaskFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<ScanTask>, StoreError> {
        let after = match cursor {
            Some(raw) => Some(
                decode_cursor(raw).ok_or_else(|| StoreError::InvalidCursor(raw.to_string()))?,
            ),
            None => None,
        };

        let tables = self.tables.read();
        let mut matches: Vec<&ScanTask> =
            tables.tasks.values().filter(|t| filter.matches(t)).collect();
        // created_at descending, id descending as the tie-break, so the
        // cursor is strictly monotonic.
        matches.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        let total = matches.len();

        let start = match &after {
            Some((ms, id)) => matches
                .iter()
                .position(|t| {
                    t.created_at_ms < *ms
                        || (t.created_at_ms == *ms && t.id.as_str() < id.as_str())
                })
                .unwrap_or(total),
            None => 0,
        };

        let items: Vec<ScanTask> = matches
            .into_iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect();
        let next_cursor = if start + items.len() < total {
            items
                .last()
                .map(|t| encode_cursor(t.created_at_ms, t.id.as_str()))
        } else {
            None
        };

        Ok(Page {
            items,
            total,
            next_cursor,
        })
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.tasks.remove(id).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }
        tables.findings.remove(id);
        tables.js_resources.remove(id);
        tables.api_endpoints.remove(id);
        tables.microservices.remove(id);
        tables.issues.remove(id);
        tables.audit.remove(id);
        tracing::debug!(task_id = %id, "task deleted with cascade");
        Ok(())
    }

    fn append_findings(&self, task_id: &TaskId, findings: Vec<Finding>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.tasks.contains_key(task_id) {
            return Err(StoreError::NotFound(task_id.clone()));
        }
        tables
            .findings
            .entry(task_id.clone())
            .or_default()
            .extend(findings);
        Ok(())
    }

    fn findings(&self, task_id: &TaskId) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .tables
            .read()
            .findings
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn clear_findings(&self, task_id: &TaskId) -> Result<(), StoreError> {
        self.tables.write().findings.remove(task_id);
        Ok(())
    }

    fn put_js_resources(
        &self,
        task_id: &TaskId,
        resources: Vec<JsResource>,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .js_resources
            .insert(task_id.clone(), resources);
        Ok(())
    }

    fn js_resources(&self, task_id: &TaskId) -> Result<Vec<JsResource>, StoreError> {
        Ok(self
            .tables
            .read()
            .js_resources
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn put_api_endpoints(
        &self,
        task_id: &TaskId,
        endpoints: Vec<ApiEndpoint>,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .api_endpoints
            .insert(task_id.clone(), endpoints);
        Ok(())
    }

    fn api_endpoints(&self, task_id: &TaskId) -> Result<Vec<ApiEndpoint>, StoreError> {
        Ok(self
            .tables
            .read()
            .api_endpoints
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn put_microservices(
        &self,
        task_id: &TaskId,
        services: Vec<Microservice>,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .microservices
            .insert(task_id.clone(), services);
        Ok(())
    }

    fn microservices(&self, task_id: &TaskId) -> Result<Vec<Microservice>, StoreError> {
        Ok(self
            .tables
            .read()
            .microservices
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_issues(
        &self,
        task_id: &TaskId,
        issues: Vec<ApiSecurityIssue>,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .issues
            .entry(task_id.clone())
            .or_default()
            .extend(issues);
        Ok(())
    }

    fn issues(&self, task_id: &TaskId) -> Result<Vec<ApiSecurityIssue>, StoreError> {
        Ok(self
            .tables
            .read()
            .issues
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.tables
            .write()
            .audit
            .entry(record.task_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    fn audit(&self, task_id: &TaskId) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .audit
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
