// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pal-apisec: The api-security scan pipeline.
//!
//! Five phases against a target's JavaScript-and-API surface: JS extraction,
//! API discovery, microservice grouping, unauthorized-access probing, and
//! sensitive-data scanning. Every outgoing request passes the SSRF-safe URL
//! validator (with post-DNS-resolution recheck) and a shared concurrency
//! semaphore.

pub mod discovery;
pub mod fetch;
pub mod js;
pub mod pipeline;
pub mod probe;
pub mod sensitive;
pub mod services;
pub mod validator;

pub use discovery::discover_endpoints;
pub use fetch::{FetchError, SafeFetcher};
pub use js::JsExtractor;
pub use pipeline::{ApiScanResult, ApiScanStats, ApiSecurityPipeline};
pub use probe::ProbeVerdict;
pub use sensitive::{scan_sensitive, SensitiveHit};
pub use validator::{DnsResolver, TokioResolver, UrlValidationError, UrlValidator};

#[cfg(any(test, feature = "test-support"))]
pub use validator::fake_dns::FakeResolver;
