// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated, concurrency-bounded HTTP fetching.
//!
//! Every request the pipeline issues goes through here: SSRF validation
//! (post-DNS recheck included) first, then the shared semaphore, then the
//! underlying client. A URL that fails validation is skipped and logged,
//! never fetched.

use crate::validator::{UrlValidationError, UrlValidator};
use pal_adapters::http::{HttpClient, HttpError, HttpResponse};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("url rejected: {0}")]
    Rejected(#[from] UrlValidationError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl FetchError {
    /// True when the URL never left the process.
    pub fn was_blocked(&self) -> bool {
        matches!(self, FetchError::Rejected(_))
    }
}

/// Shared fetcher for all pipeline phases of one task.
#[derive(Clone)]
pub struct SafeFetcher {
    http: Arc<dyn HttpClient>,
    validator: UrlValidator,
    permits: Arc<Semaphore>,
}

impl SafeFetcher {
    pub fn new(http: Arc<dyn HttpClient>, validator: UrlValidator, max_concurrent: usize) -> Self {
        Self {
            http,
            validator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    /// Validate then GET. Validation failures are logged at warn level:
    /// they are a security signal, not just an error.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        if let Err(e) = self.validator.validate(url).await {
            tracing::warn!(url, reason = %e, "blocked unsafe url");
            return Err(FetchError::Rejected(e));
        }
        let _permit = self.permits.acquire().await.ok();
        Ok(self.http.get(url).await?)
    }
}
