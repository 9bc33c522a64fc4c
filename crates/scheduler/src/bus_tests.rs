// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pal_core::{TaskId, TaskState};

fn progress(task: &str, seq: u64) -> Event {
    Event::TaskProgress {
        task_id: TaskId::new(task),
        seq,
        phase: "port-probe".to_string(),
        percent: 10,
        processed: 0,
        total: 1,
        ts_ms: seq,
    }
}

#[test]
fn events_reach_all_subscribers() {
    let bus = EventBus::new();
    let a = bus.subscribe();
    let b = bus.subscribe();

    bus.publish("alice", progress("t-1", 0));

    assert!(a.try_recv().is_some());
    assert!(b.try_recv().is_some());
}

#[test]
fn owner_filter_restricts_delivery() {
    let bus = EventBus::new();
    let alice = bus.subscribe_for(&Principal::user("alice"));
    let bob = bus.subscribe_for(&Principal::user("bob"));
    let admin = bus.subscribe_for(&Principal::admin("root"));

    bus.publish("alice", progress("t-1", 0));

    assert!(alice.try_recv().is_some());
    assert!(bob.try_recv().is_none());
    assert!(admin.try_recv().is_some());
}

#[test]
fn full_buffer_drops_oldest_and_counts() {
    let bus = EventBus::new();
    let sub = bus.subscribe_with_capacity(3);

    for seq in 0..5 {
        bus.publish("alice", progress("t-1", seq));
    }

    assert_eq!(sub.dropped(), 2);
    let seqs: Vec<u64> = sub.drain().iter().filter_map(|e| e.seq()).collect();
    // Oldest were dropped; survivors stay in order (a gap, never a reorder).
    assert_eq!(seqs, vec![2, 3, 4]);
}

#[test]
fn slow_subscriber_does_not_affect_others() {
    let bus = EventBus::new();
    let slow = bus.subscribe_with_capacity(1);
    let fast = bus.subscribe_with_capacity(100);

    for seq in 0..10 {
        bus.publish("alice", progress("t-1", seq));
    }

    assert_eq!(slow.dropped(), 9);
    assert_eq!(fast.dropped(), 0);
    assert_eq!(fast.drain().len(), 10);
}

#[test]
fn drop_unsubscribes() {
    let bus = EventBus::new();
    let sub = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);
    drop(sub);
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn recv_waits_for_publication() {
    let bus = EventBus::new();
    let sub = bus.subscribe();

    let handle = tokio::spawn({
        let bus = bus.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            bus.publish(
                "alice",
                Event::TaskStateChanged {
                    task_id: TaskId::new("t-1"),
                    state: TaskState::Completed,
                    reason: None,
                    ts_ms: 1,
                },
            );
        }
    });

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), sub.recv())
        .await
        .unwrap();
    assert!(event.is_terminal());
    handle.await.unwrap();
}
