// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn priority_beats_submission_order() {
    let queue = TaskQueue::new();
    queue.push(TaskId::new("low"), Priority::Low, 1);
    queue.push(TaskId::new("urgent"), Priority::Urgent, 2);
    queue.push(TaskId::new("normal"), Priority::Normal, 3);
    queue.push(TaskId::new("high"), Priority::High, 4);

    let mut order = Vec::new();
    for _ in 0..4 {
        order.push(queue.pop().await.unwrap().to_string());
    }
    assert_eq!(order, vec!["urgent", "high", "normal", "low"]);
}

#[tokio::test]
async fn fifo_within_a_priority_class() {
    let queue = TaskQueue::new();
    queue.push(TaskId::new("first"), Priority::Normal, 100);
    queue.push(TaskId::new("second"), Priority::Normal, 200);
    queue.push(TaskId::new("third"), Priority::Normal, 200);

    assert_eq!(queue.pop().await.unwrap(), "first");
    assert_eq!(queue.pop().await.unwrap(), "second");
    assert_eq!(queue.pop().await.unwrap(), "third");
}

#[tokio::test]
async fn pop_blocks_until_push() {
    let queue = TaskQueue::new();
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pop().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    queue.push(TaskId::new("t-1"), Priority::Normal, 1);
    let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(popped, Some(TaskId::new("t-1")));
}

#[tokio::test]
async fn close_releases_blocked_workers() {
    let queue = TaskQueue::new();
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pop().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.close();

    let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(popped, None);
}

#[tokio::test]
async fn close_drains_remaining_items_first() {
    let queue = TaskQueue::new();
    queue.push(TaskId::new("t-1"), Priority::Normal, 1);
    queue.close();

    assert_eq!(queue.pop().await, Some(TaskId::new("t-1")));
    assert_eq!(queue.pop().await, None);
}

#[tokio::test]
async fn burst_pushes_wake_multiple_waiters() {
    let queue = TaskQueue::new();
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    queue.push(TaskId::new("a"), Priority::Normal, 1);
    queue.push(TaskId::new("b"), Priority::Normal, 2);

    for worker in workers {
        let popped = tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
        assert!(popped.is_some());
    }
    assert!(queue.is_empty());
}
