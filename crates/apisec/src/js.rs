// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 1: JS resource extraction.

use crate::fetch::SafeFetcher;
use pal_core::{CancelToken, IdGen, JsResource, JsResourceId, TaskId, UuidIdGen};
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

struct Patterns {
    script_src: Regex,
    js_literal: Regex,
    api_path: Regex,
    base_path: Regex,
}

// Expressions are static and covered by tests.
#[allow(clippy::unwrap_used)]
fn patterns() -> Patterns {
    Patterns {
        script_src: Regex::new(r#"<script[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap(),
        js_literal: Regex::new(r#"["']([^"'\s]+\.js(?:\?[^"']*)?)["']"#).unwrap(),
        // Quoted absolute paths with at least two segments, excluding
        // obvious static assets.
        api_path: Regex::new(r#"["'](/[a-zA-Z][\w\-]*(?:/[\w\-{}.]+)+)["']"#).unwrap(),
        base_path: Regex::new(r"^/(?:api|v\d+|rest|service)(?:$|/)").unwrap(),
    }
}

const STATIC_SUFFIXES: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".map", ".html",
];

/// Extracts linked JS resources and the API path candidates inside them.
pub struct JsExtractor {
    fetcher: SafeFetcher,
    max_files: usize,
}

impl JsExtractor {
    pub fn new(fetcher: SafeFetcher, max_files: usize) -> Self {
        Self { fetcher, max_files }
    }

    /// Fetch the target page, enumerate linked JS, fetch each resource (up
    /// to the cap), hash it, and extract candidate API paths.
    ///
    /// Returns each resource with its body; bodies stay in memory only for
    /// the duration of the pipeline run (the sensitive-data phase needs
    /// them), the store keeps just the hash.
    pub async fn extract(
        &self,
        task_id: &TaskId,
        target_url: &str,
        cancel: &CancelToken,
        now_ms: u64,
    ) -> Vec<(JsResource, String)> {
        let page = match self.fetcher.get(target_url).await {
            Ok(response) => response.body,
            Err(e) => {
                tracing::warn!(url = target_url, error = %e, "target fetch failed");
                return Vec::new();
            }
        };

        let js_urls = collect_js_urls(&page, target_url, self.max_files);
        tracing::info!(url = target_url, js_files = js_urls.len(), "js resources enumerated");

        let mut resources = Vec::new();
        for js_url in js_urls {
            if cancel.is_cancelled() {
                break;
            }
            let body = match self.fetcher.get(&js_url).await {
                Ok(response) => response.body,
                Err(e) => {
                    tracing::debug!(url = %js_url, error = %e, "js fetch failed");
                    continue;
                }
            };

            let (api_paths, base_paths) = extract_api_paths(&body);
            let resource = JsResource {
                id: JsResourceId::new(UuidIdGen.next()),
                task_id: task_id.clone(),
                url: js_url,
                content_hash: content_hash(&body),
                size_bytes: body.len(),
                extracted_api_paths: api_paths,
                extracted_base_paths: base_paths,
                discovered_at_ms: now_ms,
            };
            resources.push((resource, body));
        }
        resources
    }
}

/// SHA-256 hex of a resource body.
pub fn content_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Enumerate JS URLs referenced by a page, absolutised against `base`.
pub fn collect_js_urls(page: &str, base: &str, cap: usize) -> Vec<String> {
    let patterns = patterns();
    let base_url = Url::parse(base).ok();

    let mut urls: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        if urls.len() >= cap {
            return;
        }
        let absolute = match (candidate.starts_with("http"), &base_url) {
            (true, _) => Some(candidate.to_string()),
            (false, Some(base)) => base.join(candidate).ok().map(String::from),
            (false, None) => None,
        };
        if let Some(url) = absolute {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    };

    for capture in patterns.script_src.captures_iter(page) {
        if let Some(src) = capture.get(1) {
            push(src.as_str());
        }
    }
    for capture in patterns.js_literal.captures_iter(page) {
        if let Some(lit) = capture.get(1) {
            if lit.as_str().split('?').next().unwrap_or("").ends_with(".js") {
                push(lit.as_str());
            }
        }
    }
    urls
}

/// Pull candidate API paths and base-API prefixes out of JS source.
pub fn extract_api_paths(body: &str) -> (Vec<String>, Vec<String>) {
    let patterns = patterns();
    let mut api_paths: Vec<String> = Vec::new();
    let mut base_paths: Vec<String> = Vec::new();

    for capture in patterns.api_path.captures_iter(body) {
        let Some(path) = capture.get(1) else { continue };
        let path = path.as_str();
        if STATIC_SUFFIXES.iter().any(|s| path.ends_with(s)) {
            continue;
        }
        if !api_paths.contains(&path.to_string()) {
            api_paths.push(path.to_string());
        }
        if patterns.base_path.is_match(path) {
            let first_segment = format!(
                "/{}",
                path.trim_start_matches('/').split('/').next().unwrap_or("")
            );
            if !base_paths.contains(&first_segment) {
                base_paths.push(first_segment);
            }
        }
    }
    (api_paths, base_paths)
}

#[cfg(test)]
#[path = "js_tests.rs"]
mod tests;
