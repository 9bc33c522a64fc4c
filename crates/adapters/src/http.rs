// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client seam for in-process scan stages.
//!
//! The pattern-scan stage and the api-security pipeline issue their own
//! HTTP requests (no external binary involved); this trait keeps them
//! testable with scripted responses. TLS verification stays on; the
//! production client never disables it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Cap on retained response bodies; larger bodies are truncated.
pub const BODY_CAP_BYTES: usize = 2 * 1024 * 1024;

const USER_AGENT: &str = "Mozilla/5.0 Palisade-Scanner";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
}

/// A fetched response, body retained up to [`BODY_CAP_BYTES`].
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers flattened to `Name: value` lines for pattern scanning.
    pub fn headers_text(&self) -> String {
        let mut text = String::new();
        for (name, value) in &self.headers {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }
}

/// Minimal GET-only client used by in-process scan phases.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;
}

/// Production client over `reqwest`. TLS verification enabled, redirects
/// followed, bounded timeout.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| HttpError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout {
                    url: url.to_string(),
                }
            } else {
                HttpError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let mut body = response.text().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if body.len() > BODY_CAP_BYTES {
            body.truncate(BODY_CAP_BYTES);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake_http {
    //! Scripted HTTP responses keyed by URL.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeHttpClient {
        responses: Mutex<HashMap<String, HttpResponse>>,
        /// Responses for URLs with no exact entry.
        fallback: Mutex<Option<HttpResponse>>,
        requests: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, response: HttpResponse) {
            self.responses.lock().insert(url.to_string(), response);
        }

        pub fn respond_with_status(&self, url: &str, status: u16) {
            self.respond(
                url,
                HttpResponse {
                    status,
                    ..HttpResponse::default()
                },
            );
        }

        pub fn fallback(&self, response: HttpResponse) {
            *self.fallback.lock() = Some(response);
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().clone()
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for FakeHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(url.to_string());
            if let Some(response) = self.responses.lock().get(url) {
                return Ok(response.clone());
            }
            if let Some(fallback) = self.fallback.lock().clone() {
                return Ok(fallback);
            }
            Err(HttpError::Request {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }
}
