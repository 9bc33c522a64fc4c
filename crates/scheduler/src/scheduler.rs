// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task admission and lifecycle control.

use crate::bus::{EventBus, Subscription};
use crate::error::SchedulerError;
use crate::queue::TaskQueue;
use crate::rate_limit::{OpClass, RateLimiter};
use crate::runner::TaskRunner;
use crate::stats::TaskStats;
use crate::worker::{publish_state, worker_loop};
use pal_apisec::UrlValidator;
use pal_core::{
    parse_interval, CancelToken, Clock, Finding, IdGen, Principal, ScanTask, SchedulerConfig,
    TaskId, TaskSpec, TaskState, TerminalReason,
};
use pal_storage::{AuditAction, AuditRecord, Page, TaskFilter, TaskStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const STATS_PAGE: usize = 500;

/// State shared between the scheduler façade and its workers.
pub(crate) struct Shared<S, R, C: Clock, G> {
    pub store: Arc<S>,
    pub runner: Arc<R>,
    pub clock: C,
    pub idgen: G,
    pub config: SchedulerConfig,
    pub validator: UrlValidator,
    pub bus: EventBus,
    pub queue: Arc<TaskQueue>,
    pub limiter: RateLimiter<C>,
    pub running: Mutex<HashMap<TaskId, CancelToken>>,
    pub shutdown: CancelToken,
}

/// Full read of a task and everything linked to it.
#[derive(Debug, Clone)]
pub struct TaskResults {
    pub task: ScanTask,
    pub findings: Vec<Finding>,
    pub js_resources: Vec<pal_core::JsResource>,
    pub endpoints: Vec<pal_core::ApiEndpoint>,
    pub microservices: Vec<pal_core::Microservice>,
    pub issues: Vec<pal_core::ApiSecurityIssue>,
}

/// Admits, queues, dispatches, and controls scan tasks.
///
/// Generic over its collaborators so tests construct fakes for the
/// store, runner, clock, and id generator.
pub struct Scheduler<S, R, C: Clock, G> {
    shared: Arc<Shared<S, R, C, G>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, R, C, G> Scheduler<S, R, C, G>
where
    S: TaskStore + 'static,
    R: TaskRunner + 'static,
    C: Clock,
    G: IdGen + 'static,
{
    pub fn new(
        store: Arc<S>,
        runner: Arc<R>,
        validator: UrlValidator,
        config: SchedulerConfig,
        clock: C,
        idgen: G,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limits.clone(), clock.clone());
        Self {
            shared: Arc::new(Shared {
                store,
                runner,
                clock,
                idgen,
                config,
                validator,
                bus: EventBus::new(),
                queue: TaskQueue::new(),
                limiter,
                running: Mutex::new(HashMap::new()),
                shutdown: CancelToken::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Call once.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        for index in 0..self.shared.config.worker_count {
            let shared = self.shared.clone();
            workers.push(tokio::spawn(worker_loop(shared, index)));
        }
        tracing::info!(workers = self.shared.config.worker_count, "scheduler started");
    }

    /// Stop accepting work and wait for the workers to drain.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.queue.close();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            let _ = worker.await;
        }
        tracing::info!("scheduler stopped");
    }

    /// Subscribe to all task events (diagnostic view).
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    /// Subscribe to events for tasks the principal may see.
    pub fn subscribe_for(&self, principal: &Principal) -> Subscription {
        self.shared.bus.subscribe_for(principal)
    }

    /// Validate, rate-limit, persist, and queue a new task.
    pub async fn submit(
        &self,
        principal: &Principal,
        spec: TaskSpec,
    ) -> Result<TaskId, SchedulerError> {
        self.validate_spec(&spec).await?;

        if let Err(retry_after_ms) = self
            .shared
            .limiter
            .try_acquire(&principal.id, OpClass::ScanCreate)
        {
            tracing::warn!(principal = %principal, "submission rate limited");
            return Err(SchedulerError::RateLimited { retry_after_ms });
        }

        if self.shared.queue.len() >= self.shared.config.max_queued_tasks {
            return Err(SchedulerError::QuotaExceeded(format!(
                "queue depth cap reached ({})",
                self.shared.config.max_queued_tasks
            )));
        }

        let task_id = TaskId::new(self.shared.idgen.next());
        let schedule = spec.schedule.clone();
        let task = ScanTask::new(task_id.clone(), principal.id.clone(), spec, &self.shared.clock);
        let priority = task.spec.priority;
        let created_at_ms = task.created_at_ms;

        self.shared.store.put_task(task.clone())?;
        self.audit(&task_id, principal, AuditAction::Submit, "");
        publish_state(&self.shared, &task, TaskState::Pending, None);
        tracing::info!(task_id = %task_id, principal = %principal, task_type = %task.spec.task_type, "task admitted");

        match schedule {
            pal_core::Schedule::Immediate => {
                self.shared.queue.push(task_id.clone(), priority, created_at_ms);
            }
            pal_core::Schedule::At { epoch_ms } => {
                let delay_ms = epoch_ms.saturating_sub(self.shared.clock.epoch_ms());
                let shared = self.shared.clone();
                let queued_id = task_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    if !shared.shutdown.is_cancelled() {
                        shared.queue.push(queued_id, priority, created_at_ms);
                    }
                });
            }
            pal_core::Schedule::Recurring { ref interval } => {
                // validate_spec checked the interval already.
                let every = parse_interval(interval).unwrap_or(Duration::from_secs(3_600));
                self.shared.queue.push(task_id.clone(), priority, created_at_ms);
                self.spawn_recurring(task_id.clone(), every);
            }
        }

        Ok(task_id)
    }

    async fn validate_spec(&self, spec: &TaskSpec) -> Result<(), SchedulerError> {
        if spec.targets.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "target list is empty".to_string(),
            ));
        }
        let min = self.shared.config.min_execution_time_ms;
        let max = self.shared.config.max_execution_time_ms;
        if spec.max_execution_time_ms < min || spec.max_execution_time_ms > max {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_execution_time_ms must be within {}..={}",
                min, max
            )));
        }
        if let pal_core::Schedule::Recurring { interval } = &spec.schedule {
            if parse_interval(interval).is_none() {
                return Err(SchedulerError::InvalidConfig(format!(
                    "unparseable interval: {}",
                    interval
                )));
            }
        }
        // Every target the engine could fetch in-process gets the SSRF
        // check, not just URL submissions: a bare domain is promoted to
        // `https://{name}` by the scan stages, so it must clear the same
        // bar. Asset references resolve elsewhere and have no URL yet.
        for target in &spec.targets {
            if let Some(url) = target.as_scan_url() {
                self.shared
                    .validator
                    .validate(&url)
                    .await
                    .map_err(|e| SchedulerError::InvalidTarget(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Each tick mints a fresh pending clone linked to the original.
    fn spawn_recurring(&self, parent_id: TaskId, every: Duration) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                if shared.shutdown.is_cancelled() {
                    break;
                }
                let Ok(parent) = shared.store.get_task(&parent_id) else {
                    break; // parent deleted, retire the schedule
                };
                let child_id = TaskId::new(shared.idgen.next());
                let mut spec = parent.spec.clone();
                spec.schedule = pal_core::Schedule::Immediate;
                let mut child =
                    ScanTask::new(child_id.clone(), parent.created_by.clone(), spec, &shared.clock);
                child.parent_task_id = Some(parent_id.clone());
                if shared.store.put_task(child.clone()).is_err() {
                    continue;
                }
                let mut parent = parent;
                parent.child_task_ids.push(child_id.clone());
                let _ = shared.store.put_task(parent);
                shared
                    .queue
                    .push(child_id, child.spec.priority, child.created_at_ms);
            }
        });
    }

    /// Cooperatively cancel a PENDING or RUNNING task. Idempotent.
    pub fn cancel(&self, principal: &Principal, task_id: &TaskId) -> Result<(), SchedulerError> {
        self.control_limit(principal)?;
        let task = self.owned_task(principal, task_id)?;
        let now_ms = self.shared.clock.epoch_ms();

        match task.state {
            TaskState::Cancelling => Ok(()), // already in flight
            TaskState::Pending => {
                // No worker to acknowledge; transition straight through.
                self.shared.store.update_state(
                    task_id,
                    TaskState::Pending,
                    TaskState::Cancelling,
                    now_ms,
                )?;
                let mut cancelled = self.shared.store.update_state(
                    task_id,
                    TaskState::Cancelling,
                    TaskState::Cancelled,
                    now_ms,
                )?;
                cancelled.reason = Some(TerminalReason::UserCancel);
                self.shared.store.put_task(cancelled.clone())?;
                self.audit(task_id, principal, AuditAction::Cancel, "pending");
                publish_state(
                    &self.shared,
                    &cancelled,
                    TaskState::Cancelled,
                    Some(TerminalReason::UserCancel),
                );
                Ok(())
            }
            TaskState::Running => {
                let updated = self.shared.store.update_state(
                    task_id,
                    TaskState::Running,
                    TaskState::Cancelling,
                    now_ms,
                )?;
                if let Some(token) = self.shared.running.lock().get(task_id) {
                    token.cancel();
                }
                self.audit(task_id, principal, AuditAction::Cancel, "running");
                publish_state(&self.shared, &updated, TaskState::Cancelling, None);
                self.spawn_cancel_watchdog(task_id.clone());
                Ok(())
            }
            state => Err(SchedulerError::NotCancellable {
                task_id: task_id.clone(),
                state,
            }),
        }
    }

    /// Force-transition if the worker never acknowledges the cancel.
    fn spawn_cancel_watchdog(&self, task_id: TaskId) {
        let shared = self.shared.clone();
        let deadline = Duration::from_millis(shared.config.cancel_hard_deadline_ms);
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let now_ms = shared.clock.epoch_ms();
            if let Ok(mut task) = shared.store.update_state(
                &task_id,
                TaskState::Cancelling,
                TaskState::Cancelled,
                now_ms,
            ) {
                tracing::warn!(task_id = %task_id, "cancel unacknowledged past hard deadline, worker suspect");
                task.reason = Some(TerminalReason::UserCancel);
                let _ = shared.store.put_task(task.clone());
                publish_state(
                    &shared,
                    &task,
                    TaskState::Cancelled,
                    Some(TerminalReason::UserCancel),
                );
            }
        });
    }

    /// Re-run a FAILED or CANCELLED task. Mints a new task id; lineage is
    /// recorded on both sides and `retry_count` carries over.
    pub fn restart(
        &self,
        principal: &Principal,
        task_id: &TaskId,
    ) -> Result<TaskId, SchedulerError> {
        self.control_limit(principal)?;
        let mut parent = self.owned_task(principal, task_id)?;
        if !matches!(parent.state, TaskState::Failed | TaskState::Cancelled) {
            return Err(SchedulerError::InvalidState {
                task_id: task_id.clone(),
                state: parent.state,
            });
        }

        let child_id = TaskId::new(self.shared.idgen.next());
        let mut child = ScanTask::new(
            child_id.clone(),
            parent.created_by.clone(),
            parent.spec.clone(),
            &self.shared.clock,
        );
        child.parent_task_id = Some(task_id.clone());
        child.retry_count = parent.retry_count;

        self.shared.store.put_task(child.clone())?;
        parent.child_task_ids.push(child_id.clone());
        self.shared.store.put_task(parent)?;
        self.audit(&child_id, principal, AuditAction::Restart, task_id.as_str());
        publish_state(&self.shared, &child, TaskState::Pending, None);
        self.shared
            .queue
            .push(child_id.clone(), child.spec.priority, child.created_at_ms);
        tracing::info!(parent = %task_id, child = %child_id, "task restarted");
        Ok(child_id)
    }

    /// Copy a task's definition into a fresh PENDING task (no results).
    pub fn clone_task(
        &self,
        principal: &Principal,
        task_id: &TaskId,
    ) -> Result<TaskId, SchedulerError> {
        self.control_limit(principal)?;
        let mut source = self.owned_task(principal, task_id)?;

        let child_id = TaskId::new(self.shared.idgen.next());
        let mut spec = source.spec.clone();
        spec.name = format!("{} (clone)", spec.name);
        let mut child = ScanTask::new(
            child_id.clone(),
            source.created_by.clone(),
            spec,
            &self.shared.clock,
        );
        child.parent_task_id = Some(task_id.clone());

        self.shared.store.put_task(child.clone())?;
        source.child_task_ids.push(child_id.clone());
        self.shared.store.put_task(source)?;
        self.audit(&child_id, principal, AuditAction::Clone, task_id.as_str());
        publish_state(&self.shared, &child, TaskState::Pending, None);
        self.shared
            .queue
            .push(child_id.clone(), child.spec.priority, child.created_at_ms);
        Ok(child_id)
    }

    /// Delete a task and cascade its artefacts. Refused while the task is
    /// RUNNING or CANCELLING; cancel first.
    pub fn delete(&self, principal: &Principal, task_id: &TaskId) -> Result<(), SchedulerError> {
        self.control_limit(principal)?;
        let task = self.owned_task(principal, task_id)?;
        if matches!(task.state, TaskState::Running | TaskState::Cancelling) {
            return Err(SchedulerError::InvalidState {
                task_id: task_id.clone(),
                state: task.state,
            });
        }
        self.shared.store.delete_task(task_id)?;
        tracing::info!(task_id = %task_id, principal = %principal, "task deleted");
        Ok(())
    }

    pub fn get(&self, principal: &Principal, task_id: &TaskId) -> Result<ScanTask, SchedulerError> {
        self.owned_task(principal, task_id)
    }

    /// Task plus findings and api-security artefacts.
    pub fn results(
        &self,
        principal: &Principal,
        task_id: &TaskId,
    ) -> Result<TaskResults, SchedulerError> {
        let task = self.owned_task(principal, task_id)?;
        Ok(TaskResults {
            findings: self.shared.store.findings(task_id)?,
            js_resources: self.shared.store.js_resources(task_id)?,
            endpoints: self.shared.store.api_endpoints(task_id)?,
            microservices: self.shared.store.microservices(task_id)?,
            issues: self.shared.store.issues(task_id)?,
            task,
        })
    }

    /// Lifecycle log for a task (the `/scans/{id}/logs` read).
    pub fn audit_log(
        &self,
        principal: &Principal,
        task_id: &TaskId,
    ) -> Result<Vec<AuditRecord>, SchedulerError> {
        self.owned_task(principal, task_id)?;
        Ok(self.shared.store.audit(task_id)?)
    }

    /// List tasks. Non-admins see only their own.
    pub fn list(
        &self,
        principal: &Principal,
        mut filter: TaskFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<ScanTask>, SchedulerError> {
        if !principal.admin {
            filter.created_by = Some(principal.id.clone());
        }
        Ok(self.shared.store.list_tasks(&filter, cursor, limit)?)
    }

    /// Aggregate counts over the tasks the principal may see.
    pub fn stats(&self, principal: &Principal) -> Result<TaskStats, SchedulerError> {
        let mut filter = TaskFilter::default();
        if !principal.admin {
            filter.created_by = Some(principal.id.clone());
        }
        let mut tasks: Vec<ScanTask> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .shared
                .store
                .list_tasks(&filter, cursor.as_deref(), STATS_PAGE)?;
            tasks.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(TaskStats::compute(tasks.iter()))
    }

    /// Re-admit persisted work after a host restart: PENDING tasks are
    /// re-queued; RUNNING tasks with no live worker binding reset to
    /// PENDING with `retry_count` unchanged; CANCELLING tasks are forced
    /// terminal.
    pub fn recover(&self) -> Result<usize, SchedulerError> {
        let mut recovered = 0usize;
        let mut cursor: Option<String> = None;
        let now_ms = self.shared.clock.epoch_ms();
        loop {
            let page = self.shared.store.list_tasks(
                &TaskFilter::default(),
                cursor.as_deref(),
                STATS_PAGE,
            )?;
            for task in &page.items {
                match task.state {
                    TaskState::Pending => {
                        self.shared
                            .queue
                            .push(task.id.clone(), task.spec.priority, task.created_at_ms);
                        recovered += 1;
                    }
                    TaskState::Running if !self.shared.running.lock().contains_key(&task.id) => {
                        if let Ok(mut reset) = self.shared.store.update_state(
                            &task.id,
                            TaskState::Running,
                            TaskState::Pending,
                            now_ms,
                        ) {
                            reset.reset_for_requeue(&self.shared.clock);
                            let _ = self.shared.store.put_task(reset);
                            self.shared.queue.push(
                                task.id.clone(),
                                task.spec.priority,
                                task.created_at_ms,
                            );
                            recovered += 1;
                        }
                    }
                    TaskState::Cancelling => {
                        if let Ok(mut cancelled) = self.shared.store.update_state(
                            &task.id,
                            TaskState::Cancelling,
                            TaskState::Cancelled,
                            now_ms,
                        ) {
                            cancelled.reason = Some(TerminalReason::UserCancel);
                            let _ = self.shared.store.put_task(cancelled.clone());
                            publish_state(
                                &self.shared,
                                &cancelled,
                                TaskState::Cancelled,
                                Some(TerminalReason::UserCancel),
                            );
                        }
                    }
                    _ => {}
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "re-admitted persisted tasks");
        }
        Ok(recovered)
    }

    fn owned_task(
        &self,
        principal: &Principal,
        task_id: &TaskId,
    ) -> Result<ScanTask, SchedulerError> {
        let task = match self.shared.store.get_task(task_id) {
            Ok(task) => task,
            Err(pal_storage::StoreError::NotFound(id)) => {
                return Err(SchedulerError::NotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        if !principal.can_access(&task.created_by) {
            return Err(SchedulerError::Forbidden);
        }
        Ok(task)
    }

    fn control_limit(&self, principal: &Principal) -> Result<(), SchedulerError> {
        self.shared
            .limiter
            .try_acquire(&principal.id, OpClass::Control)
            .map_err(|retry_after_ms| SchedulerError::RateLimited { retry_after_ms })
    }

    fn audit(&self, task_id: &TaskId, principal: &Principal, action: AuditAction, detail: &str) {
        let _ = self.shared.store.append_audit(AuditRecord {
            task_id: task_id.clone(),
            principal: principal.id.clone(),
            action,
            detail: detail.to_string(),
            at_ms: self.shared.clock.epoch_ms(),
        });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
