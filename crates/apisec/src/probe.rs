// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 4: unauthorized-access probing.

use crate::fetch::SafeFetcher;
use pal_core::{
    ApiEndpoint, ApiSecurityIssue, CancelToken, IdGen, IssueId, IssueType, Severity, TaskId,
    UuidIdGen,
};

/// Path keywords that mark an endpoint as intentionally public.
const PUBLIC_KEYWORDS: &[&str] = &["public", "common", "health", "ping"];

/// Cap on retained response bodies per endpoint (sensitive-data phase
/// input).
const RESPONSE_RETAIN_BYTES: usize = 64 * 1024;

/// Classification of one probed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// 404: dropped from output (unless configured otherwise).
    NotFound,
    /// 401/403: authentication is enforced; skipped.
    RequiresLogin,
    /// Looks intentionally public; skipped.
    Public,
    /// Reachable without authentication and not public: an issue.
    UnauthenticatedPrivate,
    /// Probe failed; endpoint skipped.
    Unreachable,
}

/// Classify a status/path pair.
pub fn classify(status: u16, api_path: &str) -> ProbeVerdict {
    if status == 404 {
        return ProbeVerdict::NotFound;
    }
    if status == 401 || status == 403 {
        return ProbeVerdict::RequiresLogin;
    }
    let path = api_path.to_ascii_lowercase();
    if PUBLIC_KEYWORDS.iter().any(|k| path.contains(k)) {
        return ProbeVerdict::Public;
    }
    ProbeVerdict::UnauthenticatedPrivate
}

/// Probe each endpoint, record observations on it, and return the
/// unauthorized-access issues. Endpoints answering 404 are dropped from
/// the returned set unless `keep_not_found` is set.
pub async fn check_unauthorized_access(
    task_id: &TaskId,
    endpoints: Vec<ApiEndpoint>,
    fetcher: &SafeFetcher,
    cancel: &CancelToken,
    keep_not_found: bool,
    max_probed: usize,
    now_ms: u64,
) -> (Vec<ApiEndpoint>, Vec<ApiSecurityIssue>) {
    let mut kept = Vec::new();
    let mut issues = Vec::new();
    let total = endpoints.len();

    for (index, mut endpoint) in endpoints.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        if index >= max_probed {
            // Past the probe budget endpoints pass through unprobed.
            kept.push(endpoint);
            continue;
        }

        let url = endpoint.full_url();
        let response = match fetcher.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "endpoint probe failed");
                continue;
            }
        };

        endpoint.observed_status = Some(response.status);
        endpoint.observed_response_size = Some(response.body.len());
        let mut body = response.body;
        body.truncate(RESPONSE_RETAIN_BYTES);
        endpoint.response_body = Some(body);

        let probe_path = format!("{}{}", endpoint.service_path, endpoint.api_path);
        match classify(response.status, &probe_path) {
            ProbeVerdict::NotFound => {
                if keep_not_found {
                    kept.push(endpoint);
                }
            }
            ProbeVerdict::UnauthenticatedPrivate => {
                issues.push(ApiSecurityIssue {
                    id: IssueId::new(UuidIdGen.next()),
                    task_id: task_id.clone(),
                    issue_type: IssueType::UnauthorizedAccess,
                    severity: Severity::High,
                    title: format!("Unauthenticated API access: {}", url),
                    description:
                        "Endpoint responds without authentication and does not look public."
                            .to_string(),
                    target_url: url,
                    evidence: serde_json::json!({
                        "api_path": endpoint.api_path,
                        "status": endpoint.observed_status,
                        "requires_login": false,
                        "is_public": false,
                    }),
                    discovered_at_ms: now_ms,
                });
                kept.push(endpoint);
            }
            ProbeVerdict::RequiresLogin | ProbeVerdict::Public => kept.push(endpoint),
            ProbeVerdict::Unreachable => {}
        }
    }

    tracing::info!(
        task_id = %task_id,
        probed = total.min(max_probed),
        kept = kept.len(),
        issues = issues.len(),
        "unauthorized-access check done"
    );
    (kept, issues)
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
