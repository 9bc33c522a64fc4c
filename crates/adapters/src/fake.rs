// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake tools for engine and scheduler tests.

use crate::record::{CrawlResult, HttpProbe, OpenPort};
use crate::subprocess::RunContext;
use crate::tool::{
    Crawler, LivenessProber, PortScanner, SubdomainEnumerator, TechDetector, TemplateScanner,
    ToolError, Toolkit,
};
use async_trait::async_trait;
use pal_core::{Finding, ToolOptions};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted failure modes, converted to [`ToolError`] at call time.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    Missing,
    Failed { code: i32, stderr: String },
    Timeout,
}

impl FakeFailure {
    fn to_error(&self, tool: &'static str) -> ToolError {
        match self {
            FakeFailure::Missing => ToolError::Missing(tool.to_string()),
            FakeFailure::Failed { code, stderr } => ToolError::Failed {
                tool: tool.to_string(),
                code: Some(*code),
                stderr: stderr.clone(),
            },
            FakeFailure::Timeout => ToolError::Timeout {
                tool: tool.to_string(),
            },
        }
    }
}

struct Scripted<T> {
    result: Mutex<Result<T, FakeFailure>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl<T: Clone + Default> Default for Scripted<T> {
    fn default() -> Self {
        Self {
            result: Mutex::new(Ok(T::default())),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> Scripted<T> {
    async fn resolve(&self, tool: &'static str, ctx: &RunContext) -> Result<T, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            // Sleep in slices so a cancel is noticed promptly, like the real
            // subprocess poll loop.
            let slice = Duration::from_millis(10);
            let mut remaining = delay;
            while !remaining.is_zero() {
                if ctx.cancel.is_cancelled() {
                    return Err(ToolError::Cancelled {
                        tool: tool.to_string(),
                    });
                }
                let step = remaining.min(slice);
                tokio::time::sleep(step).await;
                remaining -= step;
            }
        }
        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: tool.to_string(),
            });
        }
        match &*self.result.lock() {
            Ok(value) => Ok(value.clone()),
            Err(failure) => Err(failure.to_error(tool)),
        }
    }
}

/// A fully scripted [`Toolkit`] plus handles to adjust behaviour per test.
#[derive(Default)]
pub struct FakeToolkit {
    subdomains: Arc<FakeStage<Vec<String>>>,
    liveness: Arc<FakeStage<Vec<HttpProbe>>>,
    ports: Arc<FakeStage<Vec<OpenPort>>>,
    templates: Arc<FakeStage<Vec<Finding>>>,
    tech: Arc<FakeStage<HttpProbe>>,
    crawler: Arc<FakeStage<CrawlResult>>,
}

pub struct FakeStage<T> {
    inner: Scripted<T>,
}

impl<T: Clone + Default> Default for FakeStage<T> {
    fn default() -> Self {
        Self {
            inner: Scripted::default(),
        }
    }
}

impl<T: Clone + Default> FakeStage<T> {
    pub fn succeed_with(&self, value: T) {
        *self.inner.result.lock() = Ok(value);
    }

    pub fn fail_with(&self, failure: FakeFailure) {
        *self.inner.result.lock() = Err(failure);
    }

    /// Make this stage take `delay` before resolving (cancel-aware).
    pub fn delay(&self, delay: Duration) {
        *self.inner.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subdomains(&self) -> &FakeStage<Vec<String>> {
        &self.subdomains
    }

    pub fn liveness(&self) -> &FakeStage<Vec<HttpProbe>> {
        &self.liveness
    }

    pub fn ports(&self) -> &FakeStage<Vec<OpenPort>> {
        &self.ports
    }

    pub fn templates(&self) -> &FakeStage<Vec<Finding>> {
        &self.templates
    }

    pub fn tech(&self) -> &FakeStage<HttpProbe> {
        &self.tech
    }

    pub fn crawler(&self) -> &FakeStage<CrawlResult> {
        &self.crawler
    }

    /// Assemble a [`Toolkit`] sharing these scripted stages.
    pub fn toolkit(&self) -> Toolkit {
        Toolkit {
            subdomains: self.subdomains.clone(),
            liveness: self.liveness.clone(),
            ports: self.ports.clone(),
            templates: self.templates.clone(),
            tech: self.tech.clone(),
            crawler: self.crawler.clone(),
        }
    }
}

#[async_trait]
impl SubdomainEnumerator for FakeStage<Vec<String>> {
    async fn enumerate(&self, _domain: &str, ctx: &RunContext) -> Result<Vec<String>, ToolError> {
        self.inner.resolve("subfinder", ctx).await
    }
}

#[async_trait]
impl LivenessProber for FakeStage<Vec<HttpProbe>> {
    async fn probe(
        &self,
        _hosts: &[String],
        ctx: &RunContext,
    ) -> Result<Vec<HttpProbe>, ToolError> {
        self.inner.resolve("httpx", ctx).await
    }
}

#[async_trait]
impl PortScanner for FakeStage<Vec<OpenPort>> {
    async fn scan(
        &self,
        _host: &str,
        _port_range: &str,
        ctx: &RunContext,
    ) -> Result<Vec<OpenPort>, ToolError> {
        self.inner.resolve("naabu", ctx).await
    }
}

#[async_trait]
impl TemplateScanner for FakeStage<Vec<Finding>> {
    async fn scan(
        &self,
        _url: &str,
        _options: &ToolOptions,
        ctx: &RunContext,
    ) -> Result<Vec<Finding>, ToolError> {
        self.inner.resolve("nuclei", ctx).await
    }
}

#[async_trait]
impl TechDetector for FakeStage<HttpProbe> {
    async fn detect(&self, _url: &str, ctx: &RunContext) -> Result<HttpProbe, ToolError> {
        self.inner.resolve("httpx", ctx).await
    }
}

#[async_trait]
impl Crawler for FakeStage<CrawlResult> {
    async fn crawl(
        &self,
        _url: &str,
        _depth: u32,
        ctx: &RunContext,
    ) -> Result<CrawlResult, ToolError> {
        self.inner.resolve("katana", ctx).await
    }
}
