// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five-phase api-security pipeline.

use crate::discovery::discover_endpoints;
use crate::fetch::SafeFetcher;
use crate::js::JsExtractor;
use crate::probe::check_unauthorized_access;
use crate::sensitive::scan_sensitive;
use crate::services::identify_microservices;
use crate::validator::UrlValidator;
use indexmap::IndexMap;
use pal_adapters::http::HttpClient;
use pal_core::progress::{ProgressSink, ProgressTracker};
use pal_core::{
    ApiEndpoint, ApiSecurityConfig, ApiSecurityIssue, CancelToken, Clock, IdGen, IssueId,
    IssueType, JsResource, Microservice, ScanTask, Severity, StageState, TaskId, UuidIdGen,
};
use std::collections::HashMap;
use std::sync::Arc;

const PHASES: &[&str] = &[
    "js-extraction",
    "api-discovery",
    "microservice-grouping",
    "unauthorized-check",
    "sensitive-data",
];

/// Aggregate scan statistics.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ApiScanStats {
    pub total_js_files: usize,
    pub total_apis: usize,
    pub total_microservices: usize,
    pub total_issues: usize,
    pub issues_by_type: HashMap<String, usize>,
    pub issues_by_severity: HashMap<String, usize>,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct ApiScanResult {
    pub target_url: String,
    /// RFC3339 start/end stamps.
    pub started_at: String,
    pub finished_at: String,
    pub js_resources: Vec<JsResource>,
    pub endpoints: Vec<ApiEndpoint>,
    pub microservices: Vec<Microservice>,
    pub issues: Vec<ApiSecurityIssue>,
    pub phase_status: IndexMap<String, StageState>,
    pub stats: ApiScanStats,
    pub cancelled: bool,
}

/// Executes the api-security scan for one task.
#[derive(Clone)]
pub struct ApiSecurityPipeline<C: Clock> {
    http: Arc<dyn HttpClient>,
    validator: UrlValidator,
    config: ApiSecurityConfig,
    clock: C,
}

impl<C: Clock> ApiSecurityPipeline<C> {
    pub fn new(
        http: Arc<dyn HttpClient>,
        validator: UrlValidator,
        config: ApiSecurityConfig,
        clock: C,
    ) -> Self {
        Self {
            http,
            validator,
            config,
            clock,
        }
    }

    /// Run all five phases. A phase that fails records zero results and the
    /// pipeline proceeds; only cancellation stops it early.
    pub async fn run(
        &self,
        task: &ScanTask,
        cancel: CancelToken,
        sink: Arc<dyn ProgressSink>,
    ) -> ApiScanResult {
        let target_url = task
            .spec
            .targets
            .iter()
            .find_map(|t| t.as_scan_url())
            .unwrap_or_default();
        let span = tracing::info_span!("api_security", task_id = %task.id, url = %target_url);
        let _guard = span.enter();

        let tracker = ProgressTracker::new(task.id.clone(), sink);
        let fetcher = SafeFetcher::new(
            self.http.clone(),
            self.validator.clone(),
            self.config.max_concurrent_requests,
        );
        let extractor = JsExtractor::new(fetcher.clone(), self.config.max_js_files);

        let mut result = ApiScanResult {
            target_url: target_url.clone(),
            started_at: rfc3339(self.clock.epoch_ms()),
            finished_at: String::new(),
            js_resources: Vec::new(),
            endpoints: Vec::new(),
            microservices: Vec::new(),
            issues: Vec::new(),
            phase_status: PHASES
                .iter()
                .map(|p| (p.to_string(), StageState::Pending))
                .collect(),
            stats: ApiScanStats::default(),
            cancelled: false,
        };

        let mut js_bodies: Vec<(JsResource, String)> = Vec::new();

        for (index, phase) in PHASES.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            result
                .phase_status
                .insert(phase.to_string(), StageState::Running);
            tracing::info!(phase = *phase, "phase starting");

            match *phase {
                "js-extraction" => {
                    js_bodies = extractor
                        .extract(&task.id, &target_url, &cancel, self.clock.epoch_ms())
                        .await;
                    result.js_resources =
                        js_bodies.iter().map(|(r, _)| r.clone()).collect();
                }
                "api-discovery" => {
                    result.endpoints = discover_endpoints(
                        &task.id,
                        &target_url,
                        &result.js_resources,
                        self.clock.epoch_ms(),
                    );
                }
                "microservice-grouping" => {
                    let (services, issues) = identify_microservices(
                        &task.id,
                        &result.endpoints,
                        &fetcher,
                        &cancel,
                        self.clock.epoch_ms(),
                    )
                    .await;
                    result.microservices = services;
                    result.issues.extend(issues);
                }
                "unauthorized-check" => {
                    let endpoints = std::mem::take(&mut result.endpoints);
                    let (kept, issues) = check_unauthorized_access(
                        &task.id,
                        endpoints,
                        &fetcher,
                        &cancel,
                        task.spec.options.keep_not_found_endpoints,
                        self.config.max_probed_endpoints,
                        self.clock.epoch_ms(),
                    )
                    .await;
                    result.endpoints = kept;
                    result.issues.extend(issues);
                }
                "sensitive-data" => {
                    result.issues.extend(self.sensitive_phase(
                        &task.id,
                        &js_bodies,
                        &result.endpoints,
                    ));
                }
                _ => {}
            }

            let status = if cancel.is_cancelled() {
                StageState::Cancelled
            } else {
                StageState::Completed
            };
            result.phase_status.insert(phase.to_string(), status);
            tracker.stage(phase, &status.to_string(), self.clock.epoch_ms());

            let percent = (((index + 1) * 100) / PHASES.len()) as u8;
            tracker.progress(
                phase,
                percent,
                (index + 1) as u64,
                PHASES.len() as u64,
                self.clock.epoch_ms(),
            );
        }

        if cancel.is_cancelled() {
            result.cancelled = true;
            for status in result.phase_status.values_mut() {
                if matches!(status, StageState::Pending | StageState::Running) {
                    *status = StageState::Cancelled;
                }
            }
        }

        result.stats = statistics(&result);
        result.finished_at = rfc3339(self.clock.epoch_ms());
        tracing::info!(
            js = result.js_resources.len(),
            apis = result.endpoints.len(),
            services = result.microservices.len(),
            issues = result.issues.len(),
            cancelled = result.cancelled,
            "api-security scan finished"
        );
        result
    }

    /// Scan JS bodies and captured API responses for sensitive data.
    fn sensitive_phase(
        &self,
        task_id: &TaskId,
        js_bodies: &[(JsResource, String)],
        endpoints: &[ApiEndpoint],
    ) -> Vec<ApiSecurityIssue> {
        let now_ms = self.clock.epoch_ms();
        let mut issues = Vec::new();

        for (resource, body) in js_bodies {
            let hits = scan_sensitive(body);
            if hits.is_empty() {
                continue;
            }
            issues.push(ApiSecurityIssue {
                id: IssueId::new(UuidIdGen.next()),
                task_id: task_id.clone(),
                issue_type: IssueType::SensitiveDataLeak,
                severity: Severity::High,
                title: format!("Sensitive data in JS resource: {}", resource.url),
                description: "JavaScript resource contains sensitive-looking values.".to_string(),
                target_url: resource.url.clone(),
                evidence: serde_json::json!({ "sensitive_data": hits }),
                discovered_at_ms: now_ms,
            });
        }

        for endpoint in endpoints.iter().take(self.config.max_probed_endpoints) {
            let Some(body) = &endpoint.response_body else {
                continue;
            };
            let hits = scan_sensitive(body);
            if hits.is_empty() {
                continue;
            }
            let url = endpoint.full_url();
            issues.push(ApiSecurityIssue {
                id: IssueId::new(UuidIdGen.next()),
                task_id: task_id.clone(),
                issue_type: IssueType::SensitiveDataLeak,
                severity: Severity::High,
                title: format!("Sensitive data in API response: {}", url),
                description: "API response contains sensitive-looking values.".to_string(),
                target_url: url,
                evidence: serde_json::json!({ "sensitive_data": hits }),
                discovered_at_ms: now_ms,
            });
        }
        issues
    }
}

fn statistics(result: &ApiScanResult) -> ApiScanStats {
    let mut stats = ApiScanStats {
        total_js_files: result.js_resources.len(),
        total_apis: result.endpoints.len(),
        total_microservices: result.microservices.len(),
        total_issues: result.issues.len(),
        ..ApiScanStats::default()
    };
    for issue in &result.issues {
        *stats
            .issues_by_type
            .entry(issue.issue_type.to_string())
            .or_insert(0) += 1;
        *stats
            .issues_by_severity
            .entry(issue.severity.to_string())
            .or_insert(0) += 1;
    }
    stats
}

fn rfc3339(epoch_ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
