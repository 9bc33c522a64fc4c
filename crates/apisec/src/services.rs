// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 3: microservice grouping and technology detection.

use crate::fetch::SafeFetcher;
use pal_adapters::http::HttpResponse;
use pal_core::{
    ApiEndpoint, ApiSecurityIssue, CancelToken, IdGen, IssueId, IssueType, Microservice,
    MicroserviceId, Severity, TaskId, UuidIdGen,
};
use std::collections::BTreeMap;

/// SpringBoot Actuator endpoints probed for exposure.
const ACTUATOR_PATHS: &[&str] = &[
    "/actuator",
    "/actuator/health",
    "/actuator/info",
    "/actuator/env",
    "/actuator/beans",
    "/actuator/metrics",
    "/actuator/mappings",
];

/// Group endpoints by service path, probe each service root, and detect
/// the technology stack. Returns the services plus any component issues.
pub async fn identify_microservices(
    task_id: &TaskId,
    endpoints: &[ApiEndpoint],
    fetcher: &SafeFetcher,
    cancel: &CancelToken,
    now_ms: u64,
) -> (Vec<Microservice>, Vec<ApiSecurityIssue>) {
    // BTreeMap keeps service ordering deterministic.
    let mut groups: BTreeMap<String, Vec<&ApiEndpoint>> = BTreeMap::new();
    for endpoint in endpoints {
        if endpoint.service_path.is_empty() {
            continue;
        }
        groups.entry(endpoint.service_key()).or_default().push(endpoint);
    }

    let mut services = Vec::new();
    let mut issues = Vec::new();
    for (service_full_path, members) in groups {
        if cancel.is_cancelled() {
            break;
        }
        let Some(first) = members.first() else { continue };

        let technologies = match fetcher.get(&service_full_path).await {
            Ok(response) => detect_technologies(&response),
            Err(e) => {
                tracing::debug!(service = %service_full_path, error = %e, "service probe failed");
                Vec::new()
            }
        };

        if technologies.iter().any(|t| t == "SpringBoot" || t == "Java") {
            issues.extend(
                check_actuator_exposure(task_id, &service_full_path, fetcher, now_ms).await,
            );
        }

        let mut unique_paths: Vec<String> = Vec::new();
        for member in &members {
            if !unique_paths.contains(&member.api_path) {
                unique_paths.push(member.api_path.clone());
            }
        }

        services.push(Microservice {
            id: MicroserviceId::new(UuidIdGen.next()),
            task_id: task_id.clone(),
            base_url: first.base_url.clone(),
            service_name: first.service_path.clone(),
            service_full_path,
            endpoint_count: members.len(),
            unique_paths,
            detected_technologies: technologies,
            discovered_at_ms: now_ms,
        });
    }

    tracing::info!(task_id = %task_id, services = services.len(), issues = issues.len(), "microservice grouping done");
    (services, issues)
}

/// Detect stack signatures from response headers and body.
pub fn detect_technologies(response: &HttpResponse) -> Vec<String> {
    let mut technologies = Vec::new();

    let server = response.header("server").unwrap_or("").to_ascii_lowercase();
    if server.contains("spring") || server.contains("tomcat") {
        technologies.push("SpringBoot".to_string());
    }
    let powered = response
        .header("x-powered-by")
        .unwrap_or("")
        .to_ascii_lowercase();
    if powered.contains("java") {
        technologies.push("Java".to_string());
    }

    let body = response.body.to_ascii_lowercase();
    if body.contains("fastjson") {
        technologies.push("FastJSON".to_string());
    }
    if body.contains("log4j") {
        technologies.push("Log4j2".to_string());
    }
    technologies
}

/// Probe the well-known actuator paths; an exposed endpoint becomes a
/// component-vulnerability issue. `/health` and `/info` rank medium, the
/// rest high.
async fn check_actuator_exposure(
    task_id: &TaskId,
    service_url: &str,
    fetcher: &SafeFetcher,
    now_ms: u64,
) -> Vec<ApiSecurityIssue> {
    let mut issues = Vec::new();
    for path in ACTUATOR_PATHS {
        let url = format!("{}{}", service_url.trim_end_matches('/'), path);
        let Ok(response) = fetcher.get(&url).await else {
            continue;
        };
        if response.status != 200 {
            continue;
        }
        let severity = if path.ends_with("/health") || path.ends_with("/info") {
            Severity::Medium
        } else {
            Severity::High
        };
        issues.push(ApiSecurityIssue {
            id: IssueId::new(UuidIdGen.next()),
            task_id: task_id.clone(),
            issue_type: IssueType::ComponentVulnerability,
            severity,
            title: format!("SpringBoot Actuator exposed: {}", path),
            description: format!("Actuator endpoint {} responds without authentication.", path),
            target_url: url,
            evidence: serde_json::json!({ "path": path, "status": response.status }),
            discovered_at_ms: now_ms,
        });
    }
    issues
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
