//! Behavioral specifications for the Palisade scan-orchestration core.
//!
//! These tests drive the full stack (scheduler, worker pool, scanner
//! engine, api-security pipeline, merger, event bus) over the in-memory
//! store with scripted tools, HTTP, and DNS. See tests/specs/prelude.rs
//! for the shared harness.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/scheduling.rs"]
mod scheduling;

#[path = "specs/merging.rs"]
mod merging;

#[path = "specs/cancellation.rs"]
mod cancellation;

#[path = "specs/ssrf.rs"]
mod ssrf;

#[path = "specs/partial_success.rs"]
mod partial_success;

#[path = "specs/lineage.rs"]
mod lineage;

#[path = "specs/api_security.rs"]
mod api_security;
