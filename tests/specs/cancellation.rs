//! Cooperative cancellation through scheduler, worker, and engine.

use crate::prelude::*;
use pal_core::{TaskState, TaskType, TerminalReason};
use std::time::{Duration, Instant};

#[tokio::test]
async fn cancel_running_task_reaches_cancelled_promptly() {
    let platform = Platform::new();
    // A slow template stage keeps the task RUNNING until cancelled.
    platform.tools.templates().delay(Duration::from_secs(30));
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("slow", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Running).await;

    let started = Instant::now();
    platform.scheduler.cancel(&alice(), &task_id).unwrap();

    await_state(&sub, TaskState::Cancelling).await;
    await_state(&sub, TaskState::Cancelled).await;
    assert!(
        started.elapsed() < Duration::from_secs(6),
        "terminal event must arrive well inside the cancel deadline"
    );

    let task = platform.scheduler.get(&alice(), &task_id).unwrap();
    assert_eq!(task.state, TaskState::Cancelled);
    assert_eq!(task.reason, Some(TerminalReason::UserCancel));
    assert!(task.completed_at_ms.is_some());

    platform.scheduler.shutdown().await;
}

#[tokio::test]
async fn cancel_is_idempotent_while_in_flight() {
    let platform = Platform::new();
    platform.tools.templates().delay(Duration::from_secs(30));
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("slow", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Running).await;

    platform.scheduler.cancel(&alice(), &task_id).unwrap();
    // Second cancel while CANCELLING is a no-op, not an error.
    platform.scheduler.cancel(&alice(), &task_id).unwrap();

    await_state(&sub, TaskState::Cancelled).await;
    platform.scheduler.shutdown().await;
}

#[tokio::test]
async fn task_deadline_is_failed_with_timeout_reason() {
    let platform = Platform::new();
    platform.tools.templates().delay(Duration::from_secs(30));
    platform.start();
    let sub = platform.scheduler.subscribe();

    let spec = pal_core::TaskSpec::builder("deadline", TaskType::VulnerabilityScan)
        .target(pal_core::Target::parse("example.com").unwrap())
        .max_execution_time_ms(200)
        .build();
    let task_id = platform.scheduler.submit(&alice(), spec).await.unwrap();
    await_state(&sub, TaskState::Failed).await;

    let task = platform.scheduler.get(&alice(), &task_id).unwrap();
    assert_eq!(task.reason, Some(TerminalReason::Timeout));

    platform.scheduler.shutdown().await;
}
