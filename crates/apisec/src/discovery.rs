// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 2: API discovery.
//!
//! Materialises [`ApiEndpoint`]s from the path candidates JS extraction
//! produced, layered as `base_url + base_api_path + service_path +
//! api_path`.

use pal_core::{ApiEndpoint, EndpointId, IdGen, JsResource, TaskId, UuidIdGen};

/// Build the endpoint set for a task from its JS resources.
pub fn discover_endpoints(
    task_id: &TaskId,
    base_url: &str,
    resources: &[JsResource],
    now_ms: u64,
) -> Vec<ApiEndpoint> {
    let mut base_paths: Vec<String> = Vec::new();
    for resource in resources {
        for base in &resource.extracted_base_paths {
            if !base_paths.contains(base) {
                base_paths.push(base.clone());
            }
        }
    }

    let base_url = base_url.trim_end_matches('/').to_string();
    let mut endpoints: Vec<ApiEndpoint> = Vec::new();
    for resource in resources {
        for path in &resource.extracted_api_paths {
            let endpoint = materialise(task_id, &base_url, path, &base_paths, now_ms);
            if !endpoints.iter().any(|e| e.full_url() == endpoint.full_url()) {
                endpoints.push(endpoint);
            }
        }
    }
    tracing::info!(task_id = %task_id, endpoints = endpoints.len(), "api discovery done");
    endpoints
}

/// Split one candidate path into the layered endpoint shape.
fn materialise(
    task_id: &TaskId,
    base_url: &str,
    path: &str,
    base_paths: &[String],
    now_ms: u64,
) -> ApiEndpoint {
    let (base_api_path, rest) = match base_paths
        .iter()
        .find(|b| path == *b || path.starts_with(&format!("{}/", b)))
    {
        Some(base) => (base.clone(), &path[base.len()..]),
        None => (String::new(), path),
    };

    // First remaining segment is the service, the rest is the api path.
    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
    let (service_path, api_path) = if segments.len() >= 2 {
        (
            format!("/{}", segments[0]),
            format!("/{}", segments[1..].join("/")),
        )
    } else {
        (String::new(), format!("/{}", segments.join("/")))
    };

    ApiEndpoint {
        id: EndpointId::new(UuidIdGen.next()),
        task_id: task_id.clone(),
        base_url: base_url.to_string(),
        base_api_path,
        service_path,
        api_path,
        method: "GET".to_string(),
        observed_status: None,
        observed_response_size: None,
        response_body: None,
        discovered_at_ms: now_ms,
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
