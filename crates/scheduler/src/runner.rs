// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the scheduler and whatever executes a task.
//!
//! Production wiring is [`ScanRunner`]: scanner engine for tool-driven task
//! types, api-security pipeline for `api_security`. Tests inject scripted
//! runners.

use async_trait::async_trait;
use indexmap::IndexMap;
use pal_apisec::{ApiSecurityPipeline, UrlValidator};
use pal_core::progress::ProgressSink;
use pal_core::{
    ApiEndpoint, ApiSecurityIssue, CancelToken, Clock, Config, Finding, JsResource, Microservice,
    Progress, ScanTask, StageState, TaskType,
};
use pal_engine::ScannerEngine;
use std::sync::Arc;

/// Artefacts an api-security run persists alongside the task.
#[derive(Debug, Clone, Default)]
pub struct ApiArtifacts {
    pub js_resources: Vec<JsResource>,
    pub endpoints: Vec<ApiEndpoint>,
    pub microservices: Vec<Microservice>,
    pub issues: Vec<ApiSecurityIssue>,
}

/// Unified result of executing one task.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub findings: Vec<Finding>,
    pub stage_status: IndexMap<String, StageState>,
    pub error_messages: Vec<String>,
    pub progress: Progress,
    pub cancelled: bool,
    /// Every executed stage failed, so the task goes to FAILED.
    pub all_failed: bool,
    /// A stage hit its subprocess deadline (transient signal).
    pub timed_out_stage: bool,
    /// Exit codes of failed tools, matched against the configured retry
    /// set for transient classification.
    pub failed_exit_codes: Vec<i32>,
    pub artifacts: Option<ApiArtifacts>,
}

/// Executes one task on behalf of a worker.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(
        &self,
        task: &ScanTask,
        cancel: CancelToken,
        sink: Arc<dyn ProgressSink>,
    ) -> RunOutcome;
}

/// Production runner: engine for tool-driven scans, pipeline for
/// `api_security`.
pub struct ScanRunner<C: Clock> {
    engine: ScannerEngine<C>,
    pipeline: ApiSecurityPipeline<C>,
}

impl<C: Clock> ScanRunner<C> {
    pub fn new(engine: ScannerEngine<C>, pipeline: ApiSecurityPipeline<C>) -> Self {
        Self { engine, pipeline }
    }

    /// Wire both executors from config and shared collaborators.
    pub fn from_config(
        toolkit: pal_adapters::tool::Toolkit,
        http: Arc<dyn pal_adapters::http::HttpClient>,
        validator: UrlValidator,
        config: &Config,
        clock: C,
    ) -> Self {
        let engine = ScannerEngine::new(
            toolkit,
            http.clone(),
            validator.clone(),
            config.engine.clone(),
            config.merger.clone(),
            clock.clone(),
        )
        .with_global_inflight_cap(config.scheduler.inflight_cap);
        let pipeline =
            ApiSecurityPipeline::new(http, validator, config.api_security.clone(), clock);
        Self { engine, pipeline }
    }
}

#[async_trait]
impl<C: Clock> TaskRunner for ScanRunner<C> {
    async fn run(
        &self,
        task: &ScanTask,
        cancel: CancelToken,
        sink: Arc<dyn ProgressSink>,
    ) -> RunOutcome {
        match task.spec.task_type {
            TaskType::ApiSecurity => {
                let result = self.pipeline.run(task, cancel, sink).await;
                RunOutcome {
                    findings: Vec::new(),
                    stage_status: result.phase_status.clone(),
                    error_messages: Vec::new(),
                    progress: Progress {
                        processed_targets: 0,
                        total_targets: task.spec.targets.len() as u64,
                        success_count: result.stats.total_apis as u64,
                        error_count: 0,
                        percent: if result.cancelled { 0 } else { 100 },
                    },
                    cancelled: result.cancelled,
                    all_failed: false,
                    timed_out_stage: false,
                    failed_exit_codes: Vec::new(),
                    artifacts: Some(ApiArtifacts {
                        js_resources: result.js_resources,
                        endpoints: result.endpoints,
                        microservices: result.microservices,
                        issues: result.issues,
                    }),
                }
            }
            _ => {
                let outcome = self.engine.run(task, cancel, sink).await;
                RunOutcome {
                    all_failed: outcome.all_stages_failed(),
                    timed_out_stage: outcome.any_stage_timed_out(),
                    findings: outcome.findings,
                    stage_status: outcome.stage_status,
                    error_messages: outcome.error_messages,
                    progress: outcome.progress,
                    cancelled: outcome.cancelled,
                    failed_exit_codes: outcome.failed_exit_codes,
                    artifacts: None,
                }
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake_runner {
    //! Scripted runner for scheduler tests.

    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// What the fake should do for each run.
    #[derive(Debug, Clone)]
    pub enum Script {
        /// Complete after `delay` with the given findings.
        Complete {
            delay: Duration,
            findings: Vec<Finding>,
        },
        /// Fail every stage; `exit_code` drives retry classification.
        Fail { exit_code: i32 },
        /// Run until cancelled (observes the token).
        RunUntilCancelled,
    }

    pub struct FakeRunner {
        script: Mutex<Script>,
        runs: Mutex<Vec<pal_core::TaskId>>,
    }

    impl FakeRunner {
        pub fn completing() -> Self {
            Self::with_script(Script::Complete {
                delay: Duration::ZERO,
                findings: Vec::new(),
            })
        }

        pub fn with_script(script: Script) -> Self {
            Self {
                script: Mutex::new(script),
                runs: Mutex::new(Vec::new()),
            }
        }

        pub fn set_script(&self, script: Script) {
            *self.script.lock() = script;
        }

        pub fn runs(&self) -> Vec<pal_core::TaskId> {
            self.runs.lock().clone()
        }
    }

    #[async_trait]
    impl TaskRunner for FakeRunner {
        async fn run(
            &self,
            task: &ScanTask,
            cancel: CancelToken,
            _sink: Arc<dyn ProgressSink>,
        ) -> RunOutcome {
            self.runs.lock().push(task.id.clone());
            let script = self.script.lock().clone();
            match script {
                Script::Complete { delay, findings } => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if cancel.is_cancelled() {
                        return RunOutcome {
                            cancelled: true,
                            ..RunOutcome::default()
                        };
                    }
                    let mut stage_status = IndexMap::new();
                    stage_status.insert("port-probe".to_string(), StageState::Completed);
                    RunOutcome {
                        findings,
                        stage_status,
                        progress: Progress {
                            processed_targets: task.spec.targets.len() as u64,
                            total_targets: task.spec.targets.len() as u64,
                            success_count: task.spec.targets.len() as u64,
                            error_count: 0,
                            percent: 100,
                        },
                        ..RunOutcome::default()
                    }
                }
                Script::Fail { exit_code } => {
                    let mut stage_status = IndexMap::new();
                    stage_status.insert("port-probe".to_string(), StageState::Failed);
                    RunOutcome {
                        stage_status,
                        error_messages: vec![format!("port-probe: tool exited {}", exit_code)],
                        all_failed: true,
                        failed_exit_codes: vec![exit_code],
                        ..RunOutcome::default()
                    }
                }
                Script::RunUntilCancelled => {
                    while !cancel.is_cancelled() {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    RunOutcome {
                        cancelled: true,
                        ..RunOutcome::default()
                    }
                }
            }
        }
    }
}
