//! Cross-tool finding deduplication through the full pipeline.

use crate::prelude::*;
use pal_storage::TaskStore;
use pal_core::{Finding, Severity, TaskState, TaskType};

fn injection_finding(id: &str, title: &str, severity: Severity, source: &str) -> Finding {
    let mut finding = Finding::stub(id, title, severity, source);
    finding.category = "injection".to_string();
    finding
}

#[tokio::test]
async fn same_issue_from_two_sources_merges_with_max_severity() {
    // Template scanner reports "SQLi" (high); the second source reports
    // "SQL Injection" (critical). Title normalisation makes the
    // fingerprints equal; the merged finding carries the max severity and
    // both provenance entries.
    let platform = Platform::new();
    platform.tools.templates().succeed_with(vec![
        injection_finding("f-1", "SQLi", Severity::High, "template-scan"),
        injection_finding("f-2", "SQL Injection", Severity::Critical, "pattern-scan"),
    ]);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("vuln", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let findings = platform.store.findings(&task_id).unwrap();
    let injections: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.category == "injection")
        .collect();
    assert_eq!(injections.len(), 1, "both reports collapse into one");

    let merged = injections[0];
    assert_eq!(merged.severity, Severity::Critical);
    let mut sources: Vec<&str> = merged.provenance.iter().map(|p| p.source.as_str()).collect();
    sources.sort_unstable();
    assert_eq!(sources, vec!["pattern-scan", "template-scan"]);
}

#[tokio::test]
async fn merged_count_is_bounded_by_emitted_count() {
    let platform = Platform::new();
    platform.tools.templates().succeed_with(vec![
        injection_finding("f-1", "SQLi", Severity::High, "template-scan"),
        injection_finding("f-2", "sql injection", Severity::Low, "template-scan"),
        injection_finding("f-3", "SQL Injection", Severity::Medium, "template-scan"),
    ]);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform
        .scheduler
        .submit(&alice(), domain_spec("vuln", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let findings = platform.store.findings(&task_id).unwrap();
    assert!(findings.len() <= 3);
    assert_eq!(
        findings.iter().filter(|f| f.category == "injection").count(),
        1
    );
}

#[tokio::test]
async fn finding_events_carry_the_merged_severity() {
    let platform = Platform::new();
    platform.tools.templates().succeed_with(vec![
        injection_finding("f-1", "SQLi", Severity::High, "template-scan"),
        injection_finding("f-2", "SQL Injection", Severity::Critical, "pattern-scan"),
    ]);
    platform.start();
    let sub = platform.scheduler.subscribe();

    platform
        .scheduler
        .submit(&alice(), domain_spec("vuln", TaskType::VulnerabilityScan))
        .await
        .unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let severities: Vec<Severity> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            pal_core::Event::TaskFinding { severity, title, .. } if title == "SQLi" => {
                Some(severity)
            }
            _ => None,
        })
        .collect();
    assert_eq!(severities, vec![Severity::Critical]);
}
