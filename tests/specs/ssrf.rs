//! SSRF-safe validation at the submission boundary and inside the
//! api-security pipeline.

use crate::prelude::*;
use pal_core::{Target, TaskSpec, TaskType};

#[tokio::test]
async fn url_resolving_to_private_address_is_rejected_at_submission() {
    // `http://internal-admin.corp.local/` resolves to 10.0.0.5: the
    // submission returns InvalidTarget, no task is created, and no
    // outbound connection is attempted.
    let platform = Platform::new();
    platform
        .resolver
        .record("internal-admin.corp.local", vec!["10.0.0.5".parse().unwrap()]);

    let spec = TaskSpec::builder("probe", TaskType::VulnerabilityScan)
        .target(Target::parse("http://internal-admin.corp.local/").unwrap())
        .build();
    let err = platform.scheduler.submit(&alice(), spec).await.unwrap_err();

    assert_eq!(err.code(), "INVALID_TARGET");
    assert_eq!(platform.store.task_count(), 0);
    assert_eq!(platform.http.calls(), 0);
}

#[tokio::test]
async fn bare_domain_form_of_an_internal_host_is_rejected() {
    // The domain form is promoted to https:// by the scan stages, so it
    // must not slip past the check the URL form gets.
    let platform = Platform::new();
    platform
        .resolver
        .record("internal-admin.corp.local", vec!["10.0.0.5".parse().unwrap()]);

    let spec = TaskSpec::builder("probe", TaskType::Comprehensive)
        .target(Target::parse("internal-admin.corp.local").unwrap())
        .build();
    let err = platform.scheduler.submit(&alice(), spec).await.unwrap_err();

    assert_eq!(err.code(), "INVALID_TARGET");
    assert_eq!(platform.store.task_count(), 0);
    assert_eq!(platform.http.calls(), 0);
}

#[tokio::test]
async fn loopback_literal_is_rejected() {
    let platform = Platform::new();
    let spec = TaskSpec::builder("probe", TaskType::VulnerabilityScan)
        .target(Target::parse("http://127.0.0.1:8080/admin").unwrap())
        .build();
    let err = platform.scheduler.submit(&alice(), spec).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_TARGET");
}

#[tokio::test]
async fn denylisted_host_is_rejected() {
    let mut config = pal_core::Config::default();
    config.scheduler.min_execution_time_ms = 1;
    config.ssrf.host_denylist = vec!["corp.internal".to_string()];
    let platform = Platform::with_config(config);

    let spec = TaskSpec::builder("probe", TaskType::VulnerabilityScan)
        .target(Target::parse("https://admin.corp.internal/").unwrap())
        .build();
    let err = platform.scheduler.submit(&alice(), spec).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_TARGET");
}

#[tokio::test]
async fn public_url_target_is_admitted() {
    let platform = Platform::new();
    let spec = TaskSpec::builder("probe", TaskType::VulnerabilityScan)
        .target(Target::parse("https://app.example.com/portal").unwrap())
        .build();
    assert!(platform.scheduler.submit(&alice(), spec).await.is_ok());
}
