// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-task scan orchestrator.

use crate::merger::{MergeStats, VulnerabilityMerger};
use crate::rules::RuleSet;
use crate::stages::{layers, stage_plan, StageId};
use indexmap::IndexMap;
use pal_adapters::http::HttpClient;
use pal_adapters::record::{CrawlResult, HttpProbe, OpenPort};
use pal_adapters::subprocess::RunContext;
use pal_adapters::tool::{ToolError, Toolkit};
use pal_apisec::{SafeFetcher, UrlValidator};
use pal_core::progress::{ProgressSink, ProgressTracker};
use pal_core::{
    CancelToken, Clock, EngineConfig, Finding, MergerConfig, Progress, ScanTask, StageState,
    Target,
};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Non-finding discoveries surfaced alongside the merged findings.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySummary {
    pub subdomains: Vec<String>,
    pub live_hosts: Vec<HttpProbe>,
    pub open_ports: Vec<OpenPort>,
    pub technologies: Vec<String>,
    pub crawl: CrawlResult,
}

/// Everything a finished (or aborted) scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub findings: Vec<Finding>,
    pub merge_stats: MergeStats,
    pub stage_status: IndexMap<String, StageState>,
    /// One human-readable entry per contributing failure cause.
    pub error_messages: Vec<String>,
    /// Exit codes of failed tool invocations, for transient-failure
    /// classification against the configured retry set.
    pub failed_exit_codes: Vec<i32>,
    pub progress: Progress,
    pub discovery: DiscoverySummary,
    pub cancelled: bool,
}

impl ScanOutcome {
    /// The task FAILS only when every executed stage failed; partial
    /// success still completes.
    pub fn all_stages_failed(&self) -> bool {
        let executed: Vec<&StageState> = self
            .stage_status
            .values()
            .filter(|s| !matches!(s, StageState::Skipped))
            .collect();
        !executed.is_empty() && executed.iter().all(|s| s.is_failure())
    }

    pub fn failed_stage_count(&self) -> usize {
        self.stage_status.values().filter(|s| s.is_failure()).count()
    }

    pub fn any_stage_timed_out(&self) -> bool {
        self.stage_status
            .values()
            .any(|s| matches!(s, StageState::TimedOut))
    }
}

/// What one stage hands back to the orchestrator.
struct StageResult {
    stage: StageId,
    status: StageState,
    findings: Vec<Finding>,
    data: StageData,
    /// Per-target success flags counted toward task progress. Stages over
    /// derived targets (liveness hosts, live-host port probes) leave this
    /// empty so `processed_targets` only tracks submitted targets.
    processed: Vec<bool>,
    error_message: Option<String>,
    /// Exit code of the failing tool, when the failure carried one.
    exit_code: Option<i32>,
}

enum StageData {
    None,
    Subdomains(Vec<String>),
    Live(Vec<HttpProbe>),
    Ports(Vec<OpenPort>),
    Tech(Vec<String>),
    Crawl(CrawlResult),
}

/// Inputs a stage may consume from upstream stages.
#[derive(Clone, Default)]
struct StageInputs {
    subdomains: Vec<String>,
    live_hosts: Vec<HttpProbe>,
}

/// Per-task subprocess budget, optionally nested under the scheduler's
/// global inflight cap.
#[derive(Clone)]
struct SubprocessPermits {
    task: Arc<Semaphore>,
    global: Option<Arc<Semaphore>>,
}

struct PermitGuard {
    _task: OwnedSemaphorePermit,
    _global: Option<OwnedSemaphorePermit>,
}

impl SubprocessPermits {
    async fn acquire(&self) -> Option<PermitGuard> {
        let task = self.task.clone().acquire_owned().await.ok()?;
        let global = match &self.global {
            Some(global) => Some(global.clone().acquire_owned().await.ok()?),
            None => None,
        };
        Some(PermitGuard {
            _task: task,
            _global: global,
        })
    }
}

/// Orchestrates the stages of a single scan task.
///
/// One instance serves many tasks; per-task state (merger, progress,
/// cancellation) lives in `run`. Cheap to clone; all fields are shared.
#[derive(Clone)]
pub struct ScannerEngine<C: Clock> {
    toolkit: Toolkit,
    http: Arc<dyn HttpClient>,
    /// In-process fetches (pattern-scan) pass the same SSRF gate as the
    /// api-security pipeline.
    validator: UrlValidator,
    rules: Arc<RuleSet>,
    config: EngineConfig,
    merger_config: MergerConfig,
    clock: C,
    /// Cross-task subprocess cap (the scheduler's inflight cap).
    global_permits: Option<Arc<Semaphore>>,
}

impl<C: Clock> ScannerEngine<C> {
    pub fn new(
        toolkit: Toolkit,
        http: Arc<dyn HttpClient>,
        validator: UrlValidator,
        config: EngineConfig,
        merger_config: MergerConfig,
        clock: C,
    ) -> Self {
        Self {
            toolkit,
            http,
            validator,
            rules: Arc::new(RuleSet::builtin()),
            config,
            merger_config,
            clock,
            global_permits: None,
        }
    }

    /// Bound subprocess fan-out across every concurrently running task.
    pub fn with_global_inflight_cap(mut self, cap: usize) -> Self {
        self.global_permits = Some(Arc::new(Semaphore::new(cap.max(1))));
        self
    }

    /// Execute `task` to completion, cancellation, or total failure.
    ///
    /// Safe points: the token is observed between layers, between targets,
    /// and inside every subprocess poll loop.
    pub async fn run(
        &self,
        task: &ScanTask,
        cancel: CancelToken,
        sink: Arc<dyn ProgressSink>,
    ) -> ScanOutcome {
        let span = tracing::info_span!("scan", task_id = %task.id, task_type = %task.spec.task_type);
        let _guard = span.enter();

        let plan = stage_plan(task.spec.task_type);
        let stage_layers = layers(&plan);
        let total_stages = plan.len().max(1);
        let tracker = ProgressTracker::new(task.id.clone(), sink);
        let subprocess_permits = SubprocessPermits {
            task: Arc::new(Semaphore::new(self.config.max_concurrent_subprocesses_per_task)),
            global: self.global_permits.clone(),
        };

        let mut merger = VulnerabilityMerger::new(self.merger_config.clone());
        let mut outcome = ScanOutcome {
            progress: Progress::with_total(task.spec.targets.len() as u64),
            ..ScanOutcome::default()
        };
        for def in &plan {
            outcome
                .stage_status
                .insert(def.stage.id().to_string(), StageState::Pending);
        }

        let mut inputs = StageInputs::default();
        let mut completed_stages = 0usize;

        'layers: for layer in stage_layers {
            if cancel.is_cancelled() {
                break 'layers;
            }

            let mut join: JoinSet<StageResult> = JoinSet::new();
            for stage in layer {
                let engine = self.clone();
                let task = task.clone();
                let inputs = inputs.clone();
                let stage_cancel = cancel.child();
                let permits = subprocess_permits.clone();
                outcome
                    .stage_status
                    .insert(stage.id().to_string(), StageState::Running);
                tracker.stage(stage.id(), "running", self.clock.epoch_ms());
                join.spawn(async move {
                    engine
                        .run_stage(stage, &task, &inputs, stage_cancel, permits)
                        .await
                });
            }

            while let Some(joined) = join.join_next().await {
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(error = %e, "stage task panicked or was aborted");
                        continue;
                    }
                };
                completed_stages += 1;

                outcome
                    .stage_status
                    .insert(result.stage.id().to_string(), result.status);
                tracker.stage(
                    result.stage.id(),
                    &result.status.to_string(),
                    self.clock.epoch_ms(),
                );
                if let Some(message) = result.error_message {
                    outcome.error_messages.push(message);
                }
                if let Some(code) = result.exit_code {
                    outcome.failed_exit_codes.push(code);
                }
                for success in result.processed {
                    outcome.progress.record(success);
                }

                match result.data {
                    StageData::Subdomains(subs) => {
                        inputs.subdomains = subs.clone();
                        outcome.discovery.subdomains = subs;
                    }
                    StageData::Live(probes) => {
                        inputs.live_hosts = probes.clone();
                        outcome.discovery.live_hosts = probes;
                    }
                    StageData::Ports(ports) => outcome.discovery.open_ports = ports,
                    StageData::Tech(tech) => {
                        for t in tech {
                            if !outcome.discovery.technologies.contains(&t) {
                                outcome.discovery.technologies.push(t);
                            }
                        }
                    }
                    StageData::Crawl(crawl) => outcome.discovery.crawl = crawl,
                    StageData::None => {}
                }

                let observed_at = self.clock.epoch_ms();
                for finding in result.findings {
                    let source = finding.source.clone();
                    merger.add(finding, &source, observed_at);
                }

                let percent = ((completed_stages * 100) / total_stages).min(100) as u8;
                outcome.progress.set_percent(percent);
                tracker.progress(
                    result.stage.id(),
                    percent,
                    outcome.progress.processed_targets,
                    outcome.progress.total_targets,
                    observed_at,
                );
            }
        }

        if cancel.is_cancelled() {
            outcome.cancelled = true;
            for status in outcome.stage_status.values_mut() {
                if matches!(status, StageState::Pending | StageState::Running) {
                    *status = StageState::Cancelled;
                }
            }
        }

        outcome.findings = merger.merged();
        outcome.merge_stats = merger.statistics();
        let ts = self.clock.epoch_ms();
        for finding in &outcome.findings {
            tracker.finding(finding, ts);
        }

        tracing::info!(
            task_id = %task.id,
            findings = outcome.findings.len(),
            failed_stages = outcome.failed_stage_count(),
            cancelled = outcome.cancelled,
            "scan finished"
        );
        outcome
    }

    async fn run_stage(
        &self,
        stage: StageId,
        task: &ScanTask,
        inputs: &StageInputs,
        cancel: CancelToken,
        permits: SubprocessPermits,
    ) -> StageResult {
        let timeout = stage.timeout(&self.config.stage_timeouts);
        let ctx = RunContext::new(cancel.clone(), timeout);
        tracing::debug!(stage = stage.id(), timeout_s = timeout.as_secs(), "stage starting");

        match stage {
            StageId::SubdomainEnum => self.stage_subdomains(task, &ctx, permits).await,
            StageId::LivenessCheck => self.stage_liveness(task, inputs, &ctx, permits).await,
            StageId::PortProbe => self.stage_ports(task, inputs, &ctx, permits).await,
            StageId::TemplateScan => self.stage_templates(task, &ctx, permits).await,
            StageId::PatternScan => self.stage_patterns(task, &cancel).await,
            StageId::TechDetect => self.stage_tech(task, &ctx, permits).await,
            StageId::Crawl => self.stage_crawl(task, &ctx, permits).await,
        }
    }

    async fn stage_subdomains(
        &self,
        task: &ScanTask,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        let domains: Vec<String> = task
            .spec
            .targets
            .iter()
            .filter_map(|t| match t {
                Target::Domain { name } => Some(name.clone()),
                _ => None,
            })
            .collect();

        let mut subdomains: Vec<String> = Vec::new();
        let mut processed = Vec::new();
        let mut last_error: Option<ToolError> = None;

        for domain in &domains {
            if ctx.cancel.is_cancelled() {
                return cancelled_result(StageId::SubdomainEnum);
            }
            let outcome = {
                let _permit = permits.acquire().await;
                self.toolkit.subdomains.enumerate(domain, ctx).await
            };
            match outcome {
                Ok(mut found) => {
                    // The apex itself is always a probe candidate.
                    if !found.contains(domain) {
                        found.push(domain.clone());
                    }
                    for sub in found {
                        if !subdomains.contains(&sub) {
                            subdomains.push(sub);
                        }
                    }
                    processed.push(true);
                }
                Err(e) => {
                    processed.push(false);
                    last_error = Some(e);
                }
            }
        }

        finish_fanout(
            StageId::SubdomainEnum,
            processed,
            last_error,
            StageData::Subdomains(subdomains),
            Vec::new(),
            domains.is_empty(),
        )
    }

    async fn stage_liveness(
        &self,
        task: &ScanTask,
        inputs: &StageInputs,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        let hosts: Vec<String> = if inputs.subdomains.is_empty() {
            task.spec.targets.iter().map(|t| t.host()).collect()
        } else {
            inputs.subdomains.clone()
        };

        let outcome = {
            let _permit = permits.acquire().await;
            self.toolkit.liveness.probe(&hosts, ctx).await
        };
        match outcome {
            Ok(probes) => StageResult {
                stage: StageId::LivenessCheck,
                status: StageState::Completed,
                findings: Vec::new(),
                data: StageData::Live(probes),
                processed: Vec::new(),
                error_message: None,
                exit_code: None,
            },
            Err(e) => tool_error_result(StageId::LivenessCheck, e, StageData::None),
        }
    }

    async fn stage_ports(
        &self,
        task: &ScanTask,
        inputs: &StageInputs,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        // Comprehensive scans probe the live host set; a bare port_scan
        // probes the submitted targets directly.
        let hosts: Vec<String> = if inputs.live_hosts.is_empty() {
            task.spec.targets.iter().map(|t| t.host()).collect()
        } else {
            inputs
                .live_hosts
                .iter()
                .map(|p| host_of(&p.url))
                .collect()
        };
        let port_range = task
            .spec
            .options
            .port_range
            .clone()
            .unwrap_or_else(|| "80,443,8080,8443".to_string());

        let concurrency = self.config.per_stage_target_concurrency.max(1);
        let target_permits = Arc::new(Semaphore::new(concurrency));
        let mut join: JoinSet<Result<Vec<OpenPort>, ToolError>> = JoinSet::new();
        for host in hosts.iter().cloned() {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let toolkit = self.toolkit.clone();
            let ctx = ctx.clone();
            let port_range = port_range.clone();
            let target_permits = target_permits.clone();
            let subprocess_permits = permits.clone();
            join.spawn(async move {
                let _target = target_permits.acquire().await.ok();
                let _subprocess = subprocess_permits.acquire().await;
                toolkit.ports.scan(&host, &port_range, &ctx).await
            });
        }

        let mut ports: Vec<OpenPort> = Vec::new();
        let mut processed = Vec::new();
        let mut last_error = None;
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok(Ok(found)) => {
                    for port in found {
                        if !ports.contains(&port) {
                            ports.push(port);
                        }
                    }
                    processed.push(true);
                }
                Ok(Err(e)) => {
                    processed.push(false);
                    last_error = Some(e);
                }
                Err(_) => processed.push(false),
            }
        }

        if ctx.cancel.is_cancelled() {
            return cancelled_result(StageId::PortProbe);
        }
        // Only originally submitted targets count toward progress; probes
        // over the derived live-host set do not.
        let counted = if inputs.live_hosts.is_empty() {
            processed.clone()
        } else {
            Vec::new()
        };
        let mut result = finish_fanout(
            StageId::PortProbe,
            processed,
            last_error,
            StageData::Ports(ports),
            Vec::new(),
            hosts.is_empty(),
        );
        result.processed = counted;
        result
    }

    async fn stage_templates(
        &self,
        task: &ScanTask,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        let urls = scan_urls(task);
        let mut findings = Vec::new();
        let mut processed = Vec::new();
        let mut last_error = None;

        for url in &urls {
            if ctx.cancel.is_cancelled() {
                return cancelled_result(StageId::TemplateScan);
            }
            let outcome = {
                let _permit = permits.acquire().await;
                self.toolkit
                    .templates
                    .scan(url, &task.spec.options, ctx)
                    .await
            };
            match outcome {
                Ok(found) => {
                    findings.extend(found);
                    processed.push(true);
                }
                Err(e) => {
                    processed.push(false);
                    last_error = Some(e);
                }
            }
        }

        finish_fanout(
            StageId::TemplateScan,
            processed,
            last_error,
            StageData::None,
            findings,
            urls.is_empty(),
        )
    }

    /// In-process stage: fetch each URL target through the SSRF gate and
    /// run the rule set over body and headers. URLs failing validation are
    /// never fetched.
    async fn stage_patterns(&self, task: &ScanTask, cancel: &CancelToken) -> StageResult {
        let urls = scan_urls(task);
        let fetcher = SafeFetcher::new(
            self.http.clone(),
            self.validator.clone(),
            self.config.per_stage_target_concurrency,
        );
        let mut findings = Vec::new();
        let mut processed = Vec::new();
        let mut last_error_message = None;

        for url in &urls {
            if cancel.is_cancelled() {
                return cancelled_result(StageId::PatternScan);
            }
            match fetcher.get(url).await {
                Ok(response) => {
                    let host = host_of(url);
                    let path = path_of(url);
                    findings.extend(self.rules.scan(&response.body, &host, path.as_deref()));
                    findings.extend(self.rules.scan(
                        &response.headers_text(),
                        &host,
                        path.as_deref(),
                    ));
                    processed.push(true);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "pattern-scan fetch failed");
                    last_error_message = Some(format!("pattern-scan: {}", e));
                    processed.push(false);
                }
            }
        }

        let any_success = processed.iter().any(|p| *p);
        let all_failed = !processed.is_empty() && !any_success;
        StageResult {
            stage: StageId::PatternScan,
            status: if urls.is_empty() {
                StageState::Skipped
            } else if all_failed {
                StageState::Failed
            } else {
                StageState::Completed
            },
            findings,
            data: StageData::None,
            processed,
            error_message: if all_failed { last_error_message } else { None },
            exit_code: None,
        }
    }

    async fn stage_tech(
        &self,
        task: &ScanTask,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        let urls = scan_urls(task);
        let mut technologies: Vec<String> = Vec::new();
        let mut processed = Vec::new();
        let mut last_error = None;

        for url in &urls {
            if ctx.cancel.is_cancelled() {
                return cancelled_result(StageId::TechDetect);
            }
            let outcome = {
                let _permit = permits.acquire().await;
                self.toolkit.tech.detect(url, ctx).await
            };
            match outcome {
                Ok(probe) => {
                    for tech in probe.technologies {
                        if !technologies.contains(&tech) {
                            technologies.push(tech);
                        }
                    }
                    processed.push(true);
                }
                Err(e) => {
                    processed.push(false);
                    last_error = Some(e);
                }
            }
        }

        finish_fanout(
            StageId::TechDetect,
            processed,
            last_error,
            StageData::Tech(technologies),
            Vec::new(),
            urls.is_empty(),
        )
    }

    async fn stage_crawl(
        &self,
        task: &ScanTask,
        ctx: &RunContext,
        permits: SubprocessPermits,
    ) -> StageResult {
        let urls = scan_urls(task);
        let depth = task.spec.options.crawl_depth.unwrap_or(2);
        let mut merged = CrawlResult::default();
        let mut processed = Vec::new();
        let mut last_error = None;

        for url in &urls {
            if ctx.cancel.is_cancelled() {
                return cancelled_result(StageId::Crawl);
            }
            let outcome = {
                let _permit = permits.acquire().await;
                self.toolkit.crawler.crawl(url, depth, ctx).await
            };
            match outcome {
                Ok(result) => {
                    for endpoint in result.endpoints {
                        if !merged.endpoints.contains(&endpoint) {
                            merged.endpoints.push(endpoint);
                        }
                    }
                    for parameter in result.parameters {
                        if !merged.parameters.contains(&parameter) {
                            merged.parameters.push(parameter);
                        }
                    }
                    processed.push(true);
                }
                Err(e) => {
                    processed.push(false);
                    last_error = Some(e);
                }
            }
        }

        finish_fanout(
            StageId::Crawl,
            processed,
            last_error,
            StageData::Crawl(merged),
            Vec::new(),
            urls.is_empty(),
        )
    }
}

/// URL-able targets, with bare domains promoted to `https://`.
fn scan_urls(task: &ScanTask) -> Vec<String> {
    task.spec
        .targets
        .iter()
        .filter_map(|t| t.as_scan_url())
        .collect()
}

fn host_of(url: &str) -> String {
    Target::parse(url)
        .map(|t| t.host())
        .unwrap_or_else(|| url.to_string())
}

fn path_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let path_start = rest.find('/')?;
    let path = &rest[path_start..];
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != "/").then(|| path.to_string())
}

fn cancelled_result(stage: StageId) -> StageResult {
    StageResult {
        stage,
        status: StageState::Cancelled,
        findings: Vec::new(),
        data: StageData::None,
        processed: Vec::new(),
        error_message: None,
        exit_code: None,
    }
}

fn tool_error_result(stage: StageId, error: ToolError, data: StageData) -> StageResult {
    let status = stage_state_of(&error);
    let error_message = match status {
        StageState::Skipped => None,
        _ => Some(format!("{}: {}", stage.id(), error)),
    };
    StageResult {
        stage,
        status,
        findings: Vec::new(),
        data,
        processed: Vec::new(),
        error_message,
        exit_code: exit_code_of(&error),
    }
}

fn exit_code_of(error: &ToolError) -> Option<i32> {
    match error {
        ToolError::Failed { code, .. } => *code,
        _ => None,
    }
}

fn stage_state_of(error: &ToolError) -> StageState {
    match error {
        ToolError::Missing(_) => StageState::Skipped,
        ToolError::Timeout { .. } => StageState::TimedOut,
        ToolError::Cancelled { .. } => StageState::Cancelled,
        ToolError::Spawn { .. } | ToolError::Failed { .. } => StageState::Failed,
    }
}

/// Aggregate a fan-out stage: completed when any target succeeded, failed
/// when all did not, skipped when there was nothing to do or the tool is
/// absent.
fn finish_fanout(
    stage: StageId,
    processed: Vec<bool>,
    last_error: Option<ToolError>,
    data: StageData,
    findings: Vec<Finding>,
    no_targets: bool,
) -> StageResult {
    if no_targets {
        return StageResult {
            stage,
            status: StageState::Skipped,
            findings,
            data,
            processed,
            error_message: None,
            exit_code: None,
        };
    }

    let any_success = processed.iter().any(|p| *p);
    let status = if any_success {
        StageState::Completed
    } else {
        match &last_error {
            Some(e) => stage_state_of(e),
            None => StageState::Completed,
        }
    };
    let error_message = match (&status, &last_error) {
        (StageState::Failed | StageState::TimedOut, Some(e)) => {
            Some(format!("{}: {}", stage.id(), e))
        }
        _ => None,
    };

    let exit_code = match (&status, &last_error) {
        (StageState::Failed, Some(e)) => exit_code_of(e),
        _ => None,
    };
    StageResult {
        stage,
        status,
        findings,
        data,
        processed,
        error_message,
        exit_code,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
