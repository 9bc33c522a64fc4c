// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artefacts produced by the api-security pipeline.

use crate::finding::Severity;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a discovered JS resource.
    pub struct JsResourceId;
}

crate::define_id! {
    /// Unique identifier for a discovered API endpoint.
    pub struct EndpointId;
}

crate::define_id! {
    /// Unique identifier for a detected microservice.
    pub struct MicroserviceId;
}

crate::define_id! {
    /// Unique identifier for an api-security issue.
    pub struct IssueId;
}

/// A JavaScript resource fetched during JS extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsResource {
    pub id: JsResourceId,
    pub task_id: TaskId,
    pub url: String,
    /// SHA-256 of the fetched body.
    pub content_hash: String,
    pub size_bytes: usize,
    /// Candidate API paths extracted from the body.
    #[serde(default)]
    pub extracted_api_paths: Vec<String>,
    /// Base API prefixes (`/api`, `/v2`) seen in the body.
    #[serde(default)]
    pub extracted_base_paths: Vec<String>,
    pub discovered_at_ms: u64,
}

impl JsResource {
    pub fn has_apis(&self) -> bool {
        !self.extracted_api_paths.is_empty()
    }
}

/// A materialised API endpoint: `base_url + base_api_path + service_path +
/// api_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub id: EndpointId,
    pub task_id: TaskId,
    pub base_url: String,
    #[serde(default)]
    pub base_api_path: String,
    #[serde(default)]
    pub service_path: String,
    pub api_path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_response_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    pub discovered_at_ms: u64,
}

impl ApiEndpoint {
    /// The complete probe URL.
    pub fn full_url(&self) -> String {
        format!(
            "{}{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.base_api_path,
            self.service_path,
            self.api_path
        )
    }

    /// Grouping key for microservice detection.
    pub fn service_key(&self) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.base_api_path,
            self.service_path
        )
    }
}

/// A group of endpoints sharing a service path, with detected stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microservice {
    pub id: MicroserviceId,
    pub task_id: TaskId,
    pub base_url: String,
    pub service_name: String,
    pub service_full_path: String,
    pub endpoint_count: usize,
    #[serde(default)]
    pub unique_paths: Vec<String>,
    /// e.g. `["SpringBoot", "FastJSON", "Log4j2"]`
    #[serde(default)]
    pub detected_technologies: Vec<String>,
    pub discovered_at_ms: u64,
}

/// Classification of an api-security issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    UnauthorizedAccess,
    SensitiveDataLeak,
    ComponentVulnerability,
    WeakAuthentication,
    Other,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueType::UnauthorizedAccess => "unauthorized_access",
            IssueType::SensitiveDataLeak => "sensitive_data_leak",
            IssueType::ComponentVulnerability => "component_vulnerability",
            IssueType::WeakAuthentication => "weak_authentication",
            IssueType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A security issue raised by the api-security pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSecurityIssue {
    pub id: IssueId,
    pub task_id: TaskId,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_url: String,
    /// Structured evidence, e.g. matched patterns or probe status.
    #[serde(default)]
    pub evidence: serde_json::Value,
    pub discovered_at_ms: u64,
}
