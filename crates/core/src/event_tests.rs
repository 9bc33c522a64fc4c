// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn progress_event_serde_shape() {
    let event = Event::TaskProgress {
        task_id: TaskId::new("t-1"),
        seq: 7,
        phase: "port-probe".to_string(),
        percent: 40,
        processed: 2,
        total: 5,
        ts_ms: 1000,
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task:progress");
    assert_eq!(json["seq"], 7);
    assert_eq!(json["phase"], "port-probe");

    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn terminal_detection() {
    let completed = Event::TaskStateChanged {
        task_id: TaskId::new("t-1"),
        state: TaskState::Completed,
        reason: None,
        ts_ms: 1,
    };
    assert!(completed.is_terminal());

    let running = Event::TaskStateChanged {
        task_id: TaskId::new("t-1"),
        state: TaskState::Running,
        reason: None,
        ts_ms: 1,
    };
    assert!(!running.is_terminal());

    let progress = Event::TaskProgress {
        task_id: TaskId::new("t-1"),
        seq: 0,
        phase: "crawl".to_string(),
        percent: 1,
        processed: 0,
        total: 1,
        ts_ms: 1,
    };
    assert!(!progress.is_terminal());
}

#[test]
fn cancel_reason_serializes_screaming() {
    let event = Event::TaskStateChanged {
        task_id: TaskId::new("t-1"),
        state: TaskState::Cancelled,
        reason: Some(TerminalReason::UserCancel),
        ts_ms: 1,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["reason"], "USER_CANCEL");
    assert_eq!(json["state"], "cancelled");
}

#[test]
fn seq_only_on_progress() {
    let finding = Event::TaskFinding {
        task_id: TaskId::new("t-1"),
        finding_id: FindingId::new("f-1"),
        severity: Severity::High,
        title: "SQL Injection".to_string(),
        source: "template-scan".to_string(),
        ts_ms: 1,
    };
    assert_eq!(finding.seq(), None);
    assert_eq!(finding.task_id().as_str(), "t-1");
    assert_eq!(finding.name(), "task:finding");
}
