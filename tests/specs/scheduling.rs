//! Admission, rate limiting, and end-to-end completion.

use crate::prelude::*;
use pal_adapters::record::OpenPort;
use pal_core::{Event, TaskState, TaskType};
use pal_storage::TaskFilter;
use std::time::Duration;

#[tokio::test]
async fn port_scan_flows_submit_to_completed() {
    let platform = Platform::new();
    platform.tools.ports().succeed_with(vec![
        OpenPort {
            host: "example.com".to_string(),
            port: 80,
        },
        OpenPort {
            host: "example.com".to_string(),
            port: 443,
        },
    ]);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("sweep", TaskType::PortScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Completed).await;

    let task = platform.scheduler.get(&alice(), &task_id).unwrap();
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.progress.percent, 100);
    assert_eq!(task.stage_status["port-probe"].to_string(), "completed");

    platform.scheduler.shutdown().await;
}

#[tokio::test]
async fn sixth_submission_in_window_is_rate_limited() {
    let platform = Platform::new();

    let mut admitted = Vec::new();
    for _ in 0..5 {
        admitted.push(
            platform
                .scheduler
                .submit(&alice(), domain_spec("s", TaskType::PortScan))
                .await
                .unwrap(),
        );
    }
    assert_eq!(admitted.len(), 5);

    let err = platform
        .scheduler
        .submit(&alice(), domain_spec("s", TaskType::PortScan))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RATE_LIMITED");
    assert_eq!(platform.store.task_count(), 5);

    platform.clock.advance(Duration::from_secs(60));
    assert!(platform
        .scheduler
        .submit(&alice(), domain_spec("s", TaskType::PortScan))
        .await
        .is_ok());
}

#[tokio::test]
async fn progress_sequence_numbers_are_monotonic_per_task() {
    let platform = Platform::new();
    platform
        .tools
        .subdomains()
        .succeed_with(vec!["a.example.com".to_string()]);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("enum", TaskType::SubdomainEnum))
        .await
        .unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let seqs: Vec<u64> = sub
        .drain()
        .iter()
        .filter(|e| e.task_id() == &task_id)
        .filter_map(Event::seq)
        .collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted, "per-task progress must never reorder");
}

#[tokio::test]
async fn listing_pages_newest_first() {
    let platform = Platform::new();
    for i in 0..3 {
        platform.clock.advance(Duration::from_secs(1));
        platform
            .scheduler
            .submit(&alice(), domain_spec(&format!("s{}", i), TaskType::PortScan))
            .await
            .unwrap();
    }

    let page = platform
        .scheduler
        .list(&alice(), TaskFilter::default(), None, 2)
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].created_at_ms >= page.items[1].created_at_ms);

    let rest = platform
        .scheduler
        .list(&alice(), TaskFilter::default(), page.next_cursor.as_deref(), 2)
        .unwrap();
    assert_eq!(rest.items.len(), 1);
}
