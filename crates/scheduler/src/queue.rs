// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority dispatch queue.
//!
//! Ordering: urgent > high > normal > low; FIFO by submission within a
//! priority class. Workers block on `pop` until a task arrives or the
//! queue shuts down.

use pal_core::{Priority, TaskId};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedTask {
    priority: Priority,
    created_at_ms: u64,
    /// Monotonic tiebreak so equal (priority, created_at) stays FIFO.
    seq: u64,
    task_id: TaskId,
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier submission.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at_ms.cmp(&self.created_at_ms))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shared dispatch queue between the scheduler and its workers.
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    notify: Notify,
    seq: AtomicU64,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn push(&self, task_id: TaskId, priority: Priority, created_at_ms: u64) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.heap.lock().push(QueuedTask {
            priority,
            created_at_ms,
            seq,
            task_id,
        });
        self.notify.notify_one();
    }

    /// Wait for the next task. `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<TaskId> {
        loop {
            {
                let mut heap = self.heap.lock();
                if let Some(entry) = heap.pop() {
                    // Notify stores at most one permit; re-arm so a second
                    // waiter sees remaining items after burst pushes.
                    if !heap.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(entry.task_id);
                }
            }
            if self.closed.load(AtomicOrdering::SeqCst) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Close the queue; blocked and future `pop`s drain then return `None`.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
