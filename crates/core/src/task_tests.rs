// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use std::time::Duration;
use yare::parameterized;

fn spec() -> TaskSpec {
    TaskSpec::builder("port sweep", TaskType::PortScan)
        .target(Target::parse("example.com").unwrap())
        .target(Target::parse("10.0.0.9").unwrap())
        .build()
}

#[test]
fn task_type_parse_roundtrip() {
    for t in [
        TaskType::PortScan,
        TaskType::SubdomainEnum,
        TaskType::VulnerabilityScan,
        TaskType::WebDiscovery,
        TaskType::Comprehensive,
        TaskType::ApiSecurity,
    ] {
        assert_eq!(TaskType::parse(&t.to_string()), Some(t));
    }
    assert_eq!(TaskType::parse("asset_discovery"), None);
}

#[test]
fn priority_ordering() {
    assert!(Priority::Urgent > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[parameterized(
    pending_to_running = { TaskState::Pending, TaskState::Running, true },
    pending_to_cancelling = { TaskState::Pending, TaskState::Cancelling, true },
    running_to_completed = { TaskState::Running, TaskState::Completed, true },
    running_to_failed = { TaskState::Running, TaskState::Failed, true },
    running_to_cancelling = { TaskState::Running, TaskState::Cancelling, true },
    recovery_edge = { TaskState::Running, TaskState::Pending, true },
    cancelling_to_cancelled = { TaskState::Cancelling, TaskState::Cancelled, true },
    pending_to_completed = { TaskState::Pending, TaskState::Completed, false },
    completed_to_running = { TaskState::Completed, TaskState::Running, false },
    cancelled_to_pending = { TaskState::Cancelled, TaskState::Pending, false },
    failed_to_running = { TaskState::Failed, TaskState::Running, false },
)]
fn state_transitions(from: TaskState, to: TaskState, allowed: bool) {
    assert_eq!(from.can_transition(to), allowed);
}

#[test]
fn terminal_states() {
    assert!(TaskState::Completed.is_terminal());
    assert!(TaskState::Failed.is_terminal());
    assert!(TaskState::Cancelled.is_terminal());
    assert!(!TaskState::Pending.is_terminal());
    assert!(!TaskState::Running.is_terminal());
    assert!(!TaskState::Cancelling.is_terminal());
}

#[test]
fn new_task_is_pending_with_target_total() {
    let clock = FakeClock::new();
    let task = ScanTask::new(TaskId::new("t-1"), "alice", spec(), &clock);

    assert_eq!(task.state, TaskState::Pending);
    assert_eq!(task.progress.total_targets, 2);
    assert_eq!(task.progress.processed_targets, 0);
    assert!(task.started_at_ms.is_none());
    assert!(task.completed_at_ms.is_none());
}

#[test]
fn transition_sets_timestamps() {
    let clock = FakeClock::new();
    let mut task = ScanTask::new(TaskId::new("t-1"), "alice", spec(), &clock);

    clock.advance(Duration::from_secs(2));
    task.transition(TaskState::Running, &clock);
    assert_eq!(task.started_at_ms, Some(2000));
    assert!(task.completed_at_ms.is_none());

    clock.advance(Duration::from_secs(8));
    task.transition(TaskState::Completed, &clock);
    assert_eq!(task.completed_at_ms, Some(10_000));
    assert_eq!(task.progress.percent, 100);
    assert_eq!(task.duration_ms(&clock), Some(8000));
}

#[test]
fn completed_at_set_only_on_terminal() {
    let clock = FakeClock::new();
    let mut task = ScanTask::new(TaskId::new("t-1"), "alice", spec(), &clock);

    task.transition(TaskState::Running, &clock);
    task.transition(TaskState::Cancelling, &clock);
    assert!(task.completed_at_ms.is_none());

    task.transition(TaskState::Cancelled, &clock);
    assert!(task.completed_at_ms.is_some());
}

#[test]
fn progress_never_exceeds_total() {
    let mut progress = Progress::with_total(2);
    progress.record(true);
    progress.record(false);
    progress.record(true);

    assert_eq!(progress.processed_targets, 2);
    assert_eq!(progress.success_count, 2);
    assert_eq!(progress.error_count, 1);
}

#[test]
fn reset_for_requeue_clears_execution_state() {
    let clock = FakeClock::new();
    let mut task = ScanTask::new(TaskId::new("t-1"), "alice", spec(), &clock);
    task.transition(TaskState::Running, &clock);
    task.record_stage("port-probe", StageState::Failed);
    task.push_error("naabu exited 2");
    task.transition(TaskState::Failed, &clock);
    task.retry_count = 2;

    task.reset_for_requeue(&clock);

    assert_eq!(task.state, TaskState::Pending);
    assert!(task.stage_status.is_empty());
    assert!(task.error_messages.is_empty());
    assert!(task.started_at_ms.is_none());
    assert!(task.completed_at_ms.is_none());
    // Retry budget survives a requeue
    assert_eq!(task.retry_count, 2);
}

#[test]
fn stage_status_preserves_plan_order() {
    let clock = FakeClock::new();
    let mut task = ScanTask::new(TaskId::new("t-1"), "alice", spec(), &clock);
    task.record_stage("subdomain-enum", StageState::Completed);
    task.record_stage("liveness-check", StageState::Completed);
    task.record_stage("port-probe", StageState::Failed);

    let order: Vec<&str> = task.stage_status.keys().map(String::as_str).collect();
    assert_eq!(order, vec!["subdomain-enum", "liveness-check", "port-probe"]);
}

#[test]
fn spec_serde_defaults() {
    let json = serde_json::json!({
        "name": "s",
        "task_type": "comprehensive",
        "targets": [{"kind": "domain", "name": "example.com"}],
        "max_execution_time_ms": 60000,
    });
    let spec: TaskSpec = serde_json::from_value(json).unwrap();
    assert_eq!(spec.priority, Priority::Normal);
    assert_eq!(spec.schedule, Schedule::Immediate);
    assert_eq!(spec.retry, RetryPolicy::default());
}
