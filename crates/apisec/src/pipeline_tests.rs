// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::validator::fake_dns::FakeResolver;
use pal_adapters::http::fake_http::FakeHttpClient;
use pal_adapters::http::HttpResponse;
use pal_core::{CollectingSink, Event, FakeClock, SsrfConfig, Target, TaskSpec, TaskType};

const PAGE: &str = r#"<html><head><script src="/main.js"></script></head></html>"#;
const MAIN_JS: &str = r#"
    const API_KEY = "ABCDEFGHIJKLMNOPQRSTUVWX";
    fetch("/api/user/getInfo");
    fetch("/api/user/list");
    fetch("/api/public/config");
"#;

struct Harness {
    http: Arc<FakeHttpClient>,
    resolver: Arc<FakeResolver>,
    clock: FakeClock,
    sink: Arc<CollectingSink>,
}

impl Harness {
    fn new() -> Self {
        let resolver = Arc::new(FakeResolver::new());
        resolver.record("app.example.com", vec!["93.184.216.34".parse().unwrap()]);
        Self {
            http: Arc::new(FakeHttpClient::new()),
            resolver,
            clock: FakeClock::new(),
            sink: Arc::new(CollectingSink::new()),
        }
    }

    fn pipeline(&self) -> ApiSecurityPipeline<FakeClock> {
        let validator =
            UrlValidator::with_resolver(SsrfConfig::default(), self.resolver.clone());
        ApiSecurityPipeline::new(
            self.http.clone(),
            validator,
            ApiSecurityConfig::default(),
            self.clock.clone(),
        )
    }

    fn script_happy_path(&self) {
        self.http.respond(
            "https://app.example.com/",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: PAGE.to_string(),
            },
        );
        self.http.respond(
            "https://app.example.com/main.js",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: MAIN_JS.to_string(),
            },
        );
        // Service roots: plain nginx, no component signatures.
        self.http.fallback(HttpResponse {
            status: 404,
            ..HttpResponse::default()
        });
        self.http.respond(
            "https://app.example.com/api/user/getInfo",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: r#"[{"email":"ops@example.com"}]"#.to_string(),
            },
        );
        self.http
            .respond_with_status("https://app.example.com/api/user/list", 401);
        self.http
            .respond_with_status("https://app.example.com/api/public/config", 200);
    }
}

fn task() -> ScanTask {
    let clock = FakeClock::new();
    let spec = TaskSpec::builder("api scan", TaskType::ApiSecurity)
        .target(Target::parse("https://app.example.com/").unwrap())
        .build();
    ScanTask::new(TaskId::new("t-1"), "alice", spec, &clock)
}

#[tokio::test]
async fn full_pipeline_happy_path() {
    let h = Harness::new();
    h.script_happy_path();

    let result = h
        .pipeline()
        .run(&task(), CancelToken::new(), h.sink.clone())
        .await;

    assert!(!result.cancelled);
    assert!(result
        .phase_status
        .values()
        .all(|s| *s == StageState::Completed));

    assert_eq!(result.js_resources.len(), 1);
    assert!(result.js_resources[0].has_apis());

    // Three endpoints discovered; all survive (401 skip, public skip,
    // one open issue).
    assert_eq!(result.endpoints.len(), 3);
    assert_eq!(result.microservices.len(), 2); // /user and /public

    let types: Vec<String> = result.issues.iter().map(|i| i.issue_type.to_string()).collect();
    assert!(types.contains(&"unauthorized_access".to_string()));
    // api_key in JS and email in the open endpoint's response
    assert_eq!(
        types.iter().filter(|t| *t == "sensitive_data_leak").count(),
        2
    );

    let unauthorized = result
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::UnauthorizedAccess)
        .unwrap();
    assert!(unauthorized.target_url.ends_with("/api/user/getInfo"));
    assert_eq!(unauthorized.severity, Severity::High);

    assert_eq!(result.stats.total_js_files, 1);
    assert_eq!(result.stats.total_apis, 3);
    assert_eq!(result.stats.total_issues, result.issues.len());
    assert_eq!(result.stats.issues_by_type["sensitive_data_leak"], 2);

    assert!(result.started_at.starts_with("1970-01-01T00:00:00"));
    assert!(!result.finished_at.is_empty());
}

#[tokio::test]
async fn progress_events_cover_all_phases() {
    let h = Harness::new();
    h.script_happy_path();

    let _ = h
        .pipeline()
        .run(&task(), CancelToken::new(), h.sink.clone())
        .await;

    let events = h.sink.events();
    let seqs: Vec<u64> = events.iter().filter_map(|e| e.seq()).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);

    let last_percent = events
        .iter()
        .filter_map(|e| match e {
            Event::TaskProgress { percent, .. } => Some(*percent),
            _ => None,
        })
        .next_back();
    assert_eq!(last_percent, Some(100));
}

#[tokio::test]
async fn pre_cancelled_run_does_nothing() {
    let h = Harness::new();
    h.script_happy_path();
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = h.pipeline().run(&task(), cancel, h.sink.clone()).await;

    assert!(result.cancelled);
    assert!(result
        .phase_status
        .values()
        .all(|s| *s == StageState::Cancelled));
    assert!(result.issues.is_empty());
    assert_eq!(h.http.calls(), 0);
}

#[tokio::test]
async fn unreachable_target_completes_with_zero_findings() {
    let h = Harness::new();
    // No scripted responses at all: every fetch fails.

    let result = h
        .pipeline()
        .run(&task(), CancelToken::new(), h.sink.clone())
        .await;

    assert!(!result.cancelled);
    assert!(result.js_resources.is_empty());
    assert!(result.endpoints.is_empty());
    assert!(result.issues.is_empty());
    assert!(result
        .phase_status
        .values()
        .all(|s| *s == StageState::Completed));
}

#[tokio::test]
async fn ssrf_unsafe_js_urls_are_skipped() {
    let h = Harness::new();
    // Page links a script on an internal host.
    h.resolver
        .record("internal.example", vec!["10.0.0.5".parse().unwrap()]);
    h.http.respond(
        "https://app.example.com/",
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: r#"<script src="https://internal.example/a.js"></script>"#.to_string(),
        },
    );

    let result = h
        .pipeline()
        .run(&task(), CancelToken::new(), h.sink.clone())
        .await;

    assert!(result.js_resources.is_empty());
    // The internal host was never contacted.
    assert!(!h
        .http
        .requested()
        .iter()
        .any(|u| u.contains("internal.example")));
}
