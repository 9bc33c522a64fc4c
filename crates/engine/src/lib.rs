// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pal-engine: Per-task scan orchestration.
//!
//! The [`ScannerEngine`] executes a single task: it selects the stage plan
//! for the task type, fans tool invocations out with bounded concurrency,
//! feeds per-stage findings through the [`VulnerabilityMerger`], and emits
//! progress events with per-task monotonic sequence numbers.

pub mod engine;
pub mod merger;
pub mod rules;
pub mod stages;

pub use engine::{DiscoverySummary, ScanOutcome, ScannerEngine};
pub use merger::{MergeStats, VulnerabilityMerger};
pub use pal_core::progress::{ProgressSink, ProgressTracker};
pub use rules::{Rule, RuleSet};
pub use stages::{stage_plan, StageDef, StageId};
