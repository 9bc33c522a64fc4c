// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed records parsed from tool output.

use serde::{Deserialize, Serialize};

/// One open port reported by the port scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPort {
    pub host: String,
    pub port: u16,
}

/// One probed URL with detection metadata (httpx `-json` record).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpProbe {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webserver: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// Crawl output: discovered endpoints plus the query parameters seen on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub endpoints: Vec<String>,
    pub parameters: Vec<String>,
}

impl CrawlResult {
    /// Collect unique `?key=` parameter names across the endpoint list.
    pub fn from_endpoints(endpoints: Vec<String>) -> Self {
        let mut parameters: Vec<String> = Vec::new();
        for endpoint in &endpoints {
            if let Some((_, query)) = endpoint.split_once('?') {
                for pair in query.split('&') {
                    if let Some((key, _)) = pair.split_once('=') {
                        if !key.is_empty() && !parameters.iter().any(|p| p == key) {
                            parameters.push(key.to_string());
                        }
                    }
                }
            }
        }
        Self {
            endpoints,
            parameters,
        }
    }
}
