// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker loop: pick up, execute, classify, persist, emit.

use crate::bus::OwnedSink;
use crate::runner::{RunOutcome, TaskRunner};
use crate::scheduler::Shared;
use pal_core::progress::ProgressSink;
use pal_core::{
    CancelToken, Clock, Event, IdGen, ScanTask, TaskId, TaskState, TerminalReason,
};
use pal_storage::{AuditAction, AuditRecord, TaskStore};
use std::sync::Arc;
use std::time::Duration;

pub(crate) async fn worker_loop<S, R, C, G>(shared: Arc<Shared<S, R, C, G>>, worker_index: usize)
where
    S: TaskStore + 'static,
    R: TaskRunner + 'static,
    C: Clock,
    G: IdGen + 'static,
{
    tracing::debug!(worker = worker_index, "worker started");
    while let Some(task_id) = shared.queue.pop().await {
        if shared.shutdown.is_cancelled() {
            break;
        }
        run_one(&shared, worker_index, task_id).await;
    }
    tracing::debug!(worker = worker_index, "worker stopped");
}

async fn run_one<S, R, C, G>(shared: &Arc<Shared<S, R, C, G>>, worker_index: usize, task_id: TaskId)
where
    S: TaskStore + 'static,
    R: TaskRunner + 'static,
    C: Clock,
    G: IdGen + 'static,
{
    // CAS pickup: stale queue entries (cancelled or re-queued elsewhere)
    // lose the race and are skipped.
    let task = match shared.store.update_state(
        &task_id,
        TaskState::Pending,
        TaskState::Running,
        shared.clock.epoch_ms(),
    ) {
        Ok(task) => task,
        Err(e) => {
            tracing::debug!(task_id = %task_id, error = %e, "skipping stale queue entry");
            return;
        }
    };
    tracing::info!(worker = worker_index, task_id = %task_id, "task picked up");
    publish_state(shared, &task, TaskState::Running, None);

    let cancel = CancelToken::new();
    shared
        .running
        .lock()
        .insert(task_id.clone(), cancel.clone());
    // A cancel that raced the pickup flipped the state before this token
    // was registered; observe it now.
    if let Ok(current) = shared.store.get_task(&task_id) {
        if current.state == TaskState::Cancelling {
            cancel.cancel();
        }
    }
    let sink: Arc<dyn ProgressSink> = Arc::new(OwnedSink::new(
        shared.bus.clone(),
        task.created_by.clone(),
    ));

    // Arm the task deadline; expiry behaves like cancel with reason TIMEOUT.
    let deadline = Duration::from_millis(task.spec.max_execution_time_ms.max(1));
    let run_task = task.clone();
    let run = shared.runner.run(&run_task, cancel.clone(), sink);
    tokio::pin!(run);
    let mut timed_out = false;
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::time::sleep(deadline) => {
            tracing::warn!(task_id = %task_id, "max execution time exceeded, cancelling");
            timed_out = true;
            cancel.cancel();
            run.as_mut().await
        }
    };

    shared.running.lock().remove(&task_id);
    finalize(shared, task, outcome, timed_out).await;
}

async fn finalize<S, R, C, G>(
    shared: &Arc<Shared<S, R, C, G>>,
    task: ScanTask,
    outcome: RunOutcome,
    timed_out: bool,
) where
    S: TaskStore + 'static,
    R: TaskRunner + 'static,
    C: Clock,
    G: IdGen + 'static,
{
    let task_id = task.id.clone();
    let now_ms = shared.clock.epoch_ms();

    // Transient tool failures re-queue within the retry budget.
    let transient = outcome.timed_out_stage
        || outcome
            .failed_exit_codes
            .iter()
            .any(|code| shared.config.retry.retryable_exit_codes.contains(code));
    let should_retry = !timed_out
        && !outcome.cancelled
        && outcome.all_failed
        && transient
        && task.retry_count < task.spec.retry.max_retries;

    // The CAS is the authoritative race resolution point: a user cancel
    // that flipped Running -> Cancelling first wins, and this worker then
    // acknowledges it.
    let (from, to, reason) = if timed_out {
        (TaskState::Running, TaskState::Failed, Some(TerminalReason::Timeout))
    } else if outcome.cancelled {
        (
            TaskState::Cancelling,
            TaskState::Cancelled,
            Some(TerminalReason::UserCancel),
        )
    } else if should_retry {
        (TaskState::Running, TaskState::Pending, None)
    } else if outcome.all_failed {
        (TaskState::Running, TaskState::Failed, Some(TerminalReason::Error))
    } else {
        (TaskState::Running, TaskState::Completed, None)
    };

    let transitioned = match shared.store.update_state(&task_id, from, to, now_ms) {
        Ok(task) => task,
        Err(_) => {
            // Lost a race (typically cancel). Re-read and acknowledge.
            match shared.store.get_task(&task_id) {
                Ok(current) if current.state == TaskState::Cancelling => {
                    match shared.store.update_state(
                        &task_id,
                        TaskState::Cancelling,
                        TaskState::Cancelled,
                        now_ms,
                    ) {
                        Ok(task) => task,
                        Err(e) => {
                            tracing::error!(task_id = %task_id, error = %e, "cancel ack failed");
                            return;
                        }
                    }
                }
                Ok(current) => {
                    tracing::warn!(task_id = %task_id, state = %current.state, "unexpected state at finalize");
                    return;
                }
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "task vanished at finalize");
                    return;
                }
            }
        }
    };

    // Merge execution results into the persisted record.
    let mut stored = transitioned;
    let reason = if stored.state == TaskState::Cancelled && reason.is_none() {
        Some(TerminalReason::UserCancel)
    } else {
        reason
    };
    stored.stage_status = outcome.stage_status;
    stored.error_messages = outcome.error_messages;
    stored.progress = outcome.progress;
    if stored.state == TaskState::Completed {
        stored.progress.set_percent(100);
    }
    if timed_out {
        stored.push_error("task exceeded max_execution_time".to_string());
    }
    if stored.state == TaskState::Pending {
        stored.retry_count += 1;
    }
    stored.reason = if stored.state.is_terminal() { reason } else { None };
    put_with_retry(shared.store.as_ref(), stored.clone()).await;

    // Findings reached the merger, so they are preserved regardless of the
    // terminal state.
    if !outcome.findings.is_empty() {
        if let Err(e) = shared.store.append_findings(&task_id, outcome.findings) {
            tracing::error!(task_id = %task_id, error = %e, "failed to persist findings");
        }
    }
    if let Some(artifacts) = outcome.artifacts {
        let _ = shared.store.put_js_resources(&task_id, artifacts.js_resources);
        let _ = shared.store.put_api_endpoints(&task_id, artifacts.endpoints);
        let _ = shared
            .store
            .put_microservices(&task_id, artifacts.microservices);
        let _ = shared.store.append_issues(&task_id, artifacts.issues);
    }

    let _ = shared.store.append_audit(AuditRecord {
        task_id: task_id.clone(),
        principal: stored.created_by.clone(),
        action: AuditAction::StateChange,
        detail: stored.state.to_string(),
        at_ms: now_ms,
    });

    publish_state(shared, &stored, stored.state, stored.reason);
    let elapsed = stored
        .duration_ms(&shared.clock)
        .map(pal_core::format_elapsed_ms)
        .unwrap_or_default();
    tracing::info!(task_id = %task_id, state = %stored.state, elapsed = %elapsed, "task finalized");

    // Delayed re-queue for retries.
    if stored.state == TaskState::Pending {
        let delay = Duration::from_millis(stored.spec.retry.retry_delay_ms);
        let shared = shared.clone();
        let priority = stored.spec.priority;
        let created_at_ms = stored.created_at_ms;
        tracing::info!(
            task_id = %task_id,
            retry_count = stored.retry_count,
            delay_ms = delay.as_millis() as u64,
            "transient failure, re-queueing"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !shared.shutdown.is_cancelled() {
                shared.queue.push(task_id, priority, created_at_ms);
            }
        });
    }
}

/// Store writes pause and retry with backoff rather than dropping results.
async fn put_with_retry<S: TaskStore>(store: &S, task: ScanTask) {
    let mut delay = Duration::from_millis(100);
    for attempt in 1..=3 {
        match store.put_task(task.clone()) {
            Ok(()) => return,
            Err(e) if attempt < 3 => {
                tracing::warn!(task_id = %task.id, error = %e, attempt, "task write failed, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "task write failed, giving up");
            }
        }
    }
}

pub(crate) fn publish_state<S, R, C, G>(
    shared: &Arc<Shared<S, R, C, G>>,
    task: &ScanTask,
    state: TaskState,
    reason: Option<TerminalReason>,
) where
    S: TaskStore + 'static,
    R: TaskRunner + 'static,
    C: Clock,
    G: IdGen + 'static,
{
    shared.bus.publish(
        &task.created_by,
        Event::TaskStateChanged {
            task_id: task.id.clone(),
            state,
            reason,
            ts_ms: shared.clock.epoch_ms(),
        },
    );
}
