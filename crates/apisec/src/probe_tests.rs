// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fetch::SafeFetcher;
use crate::validator::fake_dns::FakeResolver;
use crate::validator::UrlValidator;
use pal_adapters::http::fake_http::FakeHttpClient;
use pal_adapters::http::HttpResponse;
use pal_core::{EndpointId, SsrfConfig};
use std::sync::Arc;
use yare::parameterized;

#[parameterized(
    not_found = { 404, "/getInfo", ProbeVerdict::NotFound },
    unauthorized = { 401, "/getInfo", ProbeVerdict::RequiresLogin },
    forbidden = { 403, "/getInfo", ProbeVerdict::RequiresLogin },
    public_path = { 200, "/public/config", ProbeVerdict::Public },
    health_path = { 200, "/health", ProbeVerdict::Public },
    ping_path = { 200, "/ping", ProbeVerdict::Public },
    open_private = { 200, "/getUserList", ProbeVerdict::UnauthenticatedPrivate },
    open_500 = { 500, "/getUserList", ProbeVerdict::UnauthenticatedPrivate },
)]
fn classification(status: u16, path: &str, expected: ProbeVerdict) {
    assert_eq!(classify(status, path), expected);
}

fn endpoint(id: &str, api_path: &str) -> ApiEndpoint {
    ApiEndpoint {
        id: EndpointId::new(id),
        task_id: TaskId::new("t-1"),
        base_url: "https://example.com".to_string(),
        base_api_path: "/api".to_string(),
        service_path: "/user".to_string(),
        api_path: api_path.to_string(),
        method: "GET".to_string(),
        observed_status: None,
        observed_response_size: None,
        response_body: None,
        discovered_at_ms: 0,
    }
}

fn harness() -> (Arc<FakeHttpClient>, SafeFetcher) {
    let resolver = Arc::new(FakeResolver::new());
    resolver.record("example.com", vec!["93.184.216.34".parse().unwrap()]);
    let http = Arc::new(FakeHttpClient::new());
    let validator = UrlValidator::with_resolver(SsrfConfig::default(), resolver);
    let fetcher = SafeFetcher::new(http.clone(), validator, 4);
    (http, fetcher)
}

#[tokio::test]
async fn drops_404_records_issue_for_open_private() {
    let (http, fetcher) = harness();
    http.respond_with_status("https://example.com/api/user/gone", 404);
    http.respond_with_status("https://example.com/api/user/login", 401);
    http.respond(
        "https://example.com/api/user/list",
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "[{\"id\":1}]".to_string(),
        },
    );

    let endpoints = vec![
        endpoint("e-1", "/gone"),
        endpoint("e-2", "/login"),
        endpoint("e-3", "/list"),
    ];
    let (kept, issues) = check_unauthorized_access(
        &TaskId::new("t-1"),
        endpoints,
        &fetcher,
        &CancelToken::new(),
        false,
        50,
        1,
    )
    .await;

    // 404 dropped; the other two kept with observations recorded.
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|e| e.api_path != "/gone"));
    let list = kept.iter().find(|e| e.api_path == "/list").unwrap();
    assert_eq!(list.observed_status, Some(200));
    assert_eq!(list.observed_response_size, Some(10));
    assert!(list.response_body.is_some());

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::UnauthorizedAccess);
    assert_eq!(issues[0].severity, Severity::High);
    assert!(issues[0].target_url.ends_with("/api/user/list"));
}

#[tokio::test]
async fn keep_not_found_retains_404s() {
    let (http, fetcher) = harness();
    http.respond_with_status("https://example.com/api/user/gone", 404);

    let (kept, _) = check_unauthorized_access(
        &TaskId::new("t-1"),
        vec![endpoint("e-1", "/gone")],
        &fetcher,
        &CancelToken::new(),
        true,
        50,
        1,
    )
    .await;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].observed_status, Some(404));
}

#[tokio::test]
async fn unreachable_endpoints_are_skipped() {
    let (_, fetcher) = harness();
    // No scripted response: fetch errors.
    let (kept, issues) = check_unauthorized_access(
        &TaskId::new("t-1"),
        vec![endpoint("e-1", "/list")],
        &fetcher,
        &CancelToken::new(),
        false,
        50,
        1,
    )
    .await;
    assert!(kept.is_empty());
    assert!(issues.is_empty());
}

#[tokio::test]
async fn probe_budget_passes_excess_through_unprobed() {
    let (http, fetcher) = harness();
    http.respond_with_status("https://example.com/api/user/a", 401);

    let endpoints = vec![endpoint("e-1", "/a"), endpoint("e-2", "/b")];
    let (kept, _) = check_unauthorized_access(
        &TaskId::new("t-1"),
        endpoints,
        &fetcher,
        &CancelToken::new(),
        false,
        1,
        1,
    )
    .await;

    assert_eq!(kept.len(), 2);
    let unprobed = kept.iter().find(|e| e.api_path == "/b").unwrap();
    assert_eq!(unprobed.observed_status, None);
    assert_eq!(http.calls(), 1);
}
