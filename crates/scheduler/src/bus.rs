// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out to subscribers.
//!
//! Each subscriber owns a bounded ring buffer. Publishing never blocks: a
//! full buffer drops its oldest event and counts the drop. Per-task
//! ordering is preserved within a buffer (gaps are possible, reorderings
//! are not).

use pal_core::{Event, Principal};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Default per-subscriber buffer capacity.
pub const DEFAULT_BUFFER: usize = 256;

struct SubscriberState {
    buffer: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
    /// `None` subscribes to every task; `Some(id)` only to tasks owned by
    /// that principal.
    owner_filter: Option<String>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<u64, Arc<Mutex<SubscriberState>>>,
    next_id: u64,
}

/// Multiplexes task events to subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all events (admin/diagnostic view).
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_inner(None, DEFAULT_BUFFER)
    }

    /// Subscribe to events for tasks owned by `principal`. Admins see
    /// everything.
    pub fn subscribe_for(&self, principal: &Principal) -> Subscription {
        let filter = (!principal.admin).then(|| principal.id.clone());
        self.subscribe_inner(filter, DEFAULT_BUFFER)
    }

    /// Subscribe with an explicit buffer capacity.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        self.subscribe_inner(None, capacity)
    }

    fn subscribe_inner(&self, owner_filter: Option<String>, capacity: usize) -> Subscription {
        let state = Arc::new(Mutex::new(SubscriberState {
            buffer: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            dropped: 0,
            owner_filter,
            notify: Arc::new(Notify::new()),
        }));
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, state.clone());
        Subscription {
            id,
            bus: self.inner.clone(),
            state,
        }
    }

    /// Publish an event for a task owned by `owner`. Never blocks.
    pub fn publish(&self, owner: &str, event: Event) {
        let subscribers: Vec<Arc<Mutex<SubscriberState>>> =
            self.inner.lock().subscribers.values().cloned().collect();
        for subscriber in subscribers {
            let mut state = subscriber.lock();
            if let Some(filter) = &state.owner_filter {
                if filter != owner {
                    continue;
                }
            }
            if state.buffer.len() >= state.capacity {
                state.buffer.pop_front();
                state.dropped += 1;
            }
            state.buffer.push_back(event.clone());
            state.notify.notify_one();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// One subscriber's handle. Dropping unsubscribes.
pub struct Subscription {
    id: u64,
    bus: Arc<Mutex<BusInner>>,
    state: Arc<Mutex<SubscriberState>>,
}

impl Subscription {
    /// Pop the next buffered event, if any.
    pub fn try_recv(&self) -> Option<Event> {
        self.state.lock().buffer.pop_front()
    }

    /// Wait for the next event.
    pub async fn recv(&self) -> Event {
        loop {
            let notify = {
                let mut state = self.state.lock();
                if let Some(event) = state.buffer.pop_front() {
                    return event;
                }
                state.notify.clone()
            };
            notify.notified().await;
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<Event> {
        self.state.lock().buffer.drain(..).collect()
    }

    /// Events lost to buffer overflow so far.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.lock().subscribers.remove(&self.id);
    }
}

/// Progress sink bound to a task's owner, so per-user subscriptions can
/// filter without inspecting task records.
pub struct OwnedSink {
    bus: EventBus,
    owner: String,
}

impl OwnedSink {
    pub fn new(bus: EventBus, owner: String) -> Self {
        Self { bus, owner }
    }
}

impl pal_core::progress::ProgressSink for OwnedSink {
    fn emit(&self, event: Event) {
        self.bus.publish(&self.owner, event);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
