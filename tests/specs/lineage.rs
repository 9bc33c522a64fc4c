//! Restart and clone lineage.

use crate::prelude::*;
use pal_storage::TaskStore;
use pal_adapters::fake::FakeFailure;
use pal_core::{TaskState, TaskType};

async fn failed_task(platform: &Platform) -> pal_core::TaskId {
    platform.tools.templates().fail_with(FakeFailure::Failed {
        code: 2,
        stderr: "boom".to_string(),
    });
    let sub = platform.scheduler.subscribe();
    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("vuln", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Failed).await;
    task_id
}

#[tokio::test]
async fn restart_of_failed_task_is_recoverable_in_both_directions() {
    let platform = Platform::new();
    platform.start();
    let parent_id = failed_task(&platform).await;

    // Make the next attempt succeed.
    platform.tools.templates().succeed_with(Vec::new());
    platform.http.fallback(pal_adapters::http::HttpResponse {
        status: 200,
        ..pal_adapters::http::HttpResponse::default()
    });

    let sub = platform.scheduler.subscribe();
    let child_id = platform.scheduler.restart(&alice(), &parent_id).unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let parent = platform.scheduler.get(&alice(), &parent_id).unwrap();
    let child = platform.scheduler.get(&alice(), &child_id).unwrap();

    // Lineage recoverable from either end.
    assert_eq!(child.parent_task_id, Some(parent_id.clone()));
    assert!(parent.child_task_ids.contains(&child_id));

    // The child starts clean and completes; the parent record is
    // untouched history.
    assert_eq!(child.state, TaskState::Completed);
    assert!(platform.store.findings(&child_id).unwrap().is_empty());
    assert_eq!(parent.state, TaskState::Failed);
}

#[tokio::test]
async fn restart_preserves_the_retry_budget() {
    let platform = Platform::new();
    platform.start();
    let parent_id = failed_task(&platform).await;
    platform.scheduler.shutdown().await;

    let mut parent = platform.store.get_task(&parent_id).unwrap();
    parent.retry_count = 2;
    platform.store.put_task(parent).unwrap();

    let child_id = platform.scheduler.restart(&alice(), &parent_id).unwrap();
    let child = platform.store.get_task(&child_id).unwrap();
    assert_eq!(child.retry_count, 2);
}

#[tokio::test]
async fn clone_lineage_and_isolation() {
    let platform = Platform::new();
    let source_id = platform
        .scheduler
        .submit(&alice(), domain_spec("base", TaskType::PortScan))
        .await
        .unwrap();

    let clone_id = platform.scheduler.clone_task(&alice(), &source_id).unwrap();
    let clone = platform.store.get_task(&clone_id).unwrap();
    let source = platform.store.get_task(&source_id).unwrap();

    assert_eq!(clone.spec.targets, source.spec.targets);
    assert_eq!(clone.parent_task_id, Some(source_id.clone()));
    assert!(source.child_task_ids.contains(&clone_id));
    assert_eq!(clone.state, TaskState::Pending);
    assert_eq!(clone.progress.processed_targets, 0);
}
