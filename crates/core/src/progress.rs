// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting with per-task monotonic sequence numbers.

use crate::event::Event;
use crate::task::TaskId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Where progress and finding events go. Implementations must not block:
/// the event bus drops-oldest per subscriber instead of backpressuring the
/// engine.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// No-op sink for callers that do not observe progress.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Collecting sink for tests.
#[derive(Default)]
pub struct CollectingSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Stamps events for one task with a monotonic sequence number.
#[derive(Clone)]
pub struct ProgressTracker {
    task_id: TaskId,
    seq: Arc<AtomicU64>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    pub fn new(task_id: TaskId, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            task_id,
            seq: Arc::new(AtomicU64::new(0)),
            sink,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Emit a progress event with the next sequence number.
    pub fn progress(&self, phase: &str, percent: u8, processed: u64, total: u64, ts_ms: u64) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.sink.emit(Event::TaskProgress {
            task_id: self.task_id.clone(),
            seq,
            phase: phase.to_string(),
            percent,
            processed,
            total,
            ts_ms,
        });
    }

    /// Emit a stage status event (unsequenced).
    pub fn stage(&self, stage: &str, status: &str, ts_ms: u64) {
        self.sink.emit(Event::TaskStage {
            task_id: self.task_id.clone(),
            stage: stage.to_string(),
            status: status.to_string(),
            ts_ms,
        });
    }

    /// Emit a finding event (unsequenced).
    pub fn finding(&self, finding: &crate::finding::Finding, ts_ms: u64) {
        self.sink.emit(Event::TaskFinding {
            task_id: self.task_id.clone(),
            finding_id: finding.id.clone(),
            severity: finding.severity,
            title: finding.title.clone(),
            source: finding.source.clone(),
            ts_ms,
        });
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
