// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pal-adapters: External scan-tool adapters.
//!
//! Each adapter wraps one external binary: it builds the argument vector,
//! launches the subprocess with a per-stage timeout and cancellation, streams
//! stdout, and parses the tool's output format into typed records. Tools may
//! be absent at runtime; callers see that as [`ToolError::Missing`] and
//! report the stage as skipped rather than failed.

pub mod http;
pub mod httpx;
pub mod import;
pub mod katana;
pub mod naabu;
pub mod nuclei;
pub mod record;
pub mod subfinder;
pub mod subprocess;
pub mod tool;

pub use http::{HttpClient, HttpError, HttpResponse, ReqwestClient};
pub use httpx::Httpx;
pub use import::{
    parse_csv_targets, parse_json_targets, parse_nmap_targets, ImportError, ImportedAsset,
};
pub use katana::Katana;
pub use naabu::Naabu;
pub use nuclei::Nuclei;
pub use record::{CrawlResult, HttpProbe, OpenPort};
pub use subfinder::Subfinder;
pub use subprocess::{RunContext, StreamOutcome};
pub use tool::{
    Crawler, LivenessProber, PortScanner, SubdomainEnumerator, TechDetector, TemplateScanner,
    ToolError, ToolSpec, Toolkit,
};

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFailure, FakeStage, FakeToolkit};
#[cfg(any(test, feature = "test-support"))]
pub use http::fake_http::FakeHttpClient;
