// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage identifiers and the static per-task-type stage plan.

use pal_core::{StageTimeouts, TaskType};
use std::fmt;
use std::time::Duration;

/// One external-tool (or in-process) invocation within a scan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    SubdomainEnum,
    LivenessCheck,
    PortProbe,
    TemplateScan,
    PatternScan,
    TechDetect,
    Crawl,
}

impl StageId {
    pub fn id(&self) -> &'static str {
        match self {
            StageId::SubdomainEnum => "subdomain-enum",
            StageId::LivenessCheck => "liveness-check",
            StageId::PortProbe => "port-probe",
            StageId::TemplateScan => "template-scan",
            StageId::PatternScan => "pattern-scan",
            StageId::TechDetect => "tech-detect",
            StageId::Crawl => "crawl",
        }
    }

    /// Per-stage subprocess timeout from config.
    pub fn timeout(&self, timeouts: &StageTimeouts) -> Duration {
        let secs = match self {
            StageId::SubdomainEnum => timeouts.subdomain_enum_s,
            StageId::LivenessCheck => timeouts.liveness_check_s,
            StageId::PortProbe => timeouts.port_probe_s,
            StageId::TemplateScan => timeouts.template_scan_s,
            StageId::PatternScan => timeouts.pattern_scan_s,
            StageId::TechDetect => timeouts.tech_detect_s,
            StageId::Crawl => timeouts.crawl_s,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One entry of the declared stage DAG.
#[derive(Debug, Clone)]
pub struct StageDef {
    pub stage: StageId,
    pub depends_on: &'static [StageId],
    /// Optional stages may be skipped (tool missing) without marking the
    /// task degraded.
    pub optional: bool,
}

const fn def(stage: StageId, depends_on: &'static [StageId], optional: bool) -> StageDef {
    StageDef {
        stage,
        depends_on,
        optional,
    }
}

/// The static stage plan per task type. `api_security` has no plan here;
/// it is delegated to the api-security pipeline by the task runner.
pub fn stage_plan(task_type: TaskType) -> Vec<StageDef> {
    use StageId::*;
    match task_type {
        TaskType::PortScan => vec![def(PortProbe, &[], false)],
        TaskType::SubdomainEnum => vec![
            def(SubdomainEnum, &[], false),
            def(LivenessCheck, &[SubdomainEnum], false),
        ],
        TaskType::VulnerabilityScan => vec![
            def(TemplateScan, &[], false),
            def(PatternScan, &[], false),
        ],
        TaskType::WebDiscovery => vec![def(TechDetect, &[], true), def(Crawl, &[], true)],
        TaskType::Comprehensive => vec![
            def(SubdomainEnum, &[], false),
            def(LivenessCheck, &[SubdomainEnum], false),
            def(PortProbe, &[LivenessCheck], false),
            def(TemplateScan, &[PortProbe], false),
            def(PatternScan, &[PortProbe], false),
            def(TechDetect, &[PortProbe], true),
            def(Crawl, &[PortProbe], true),
        ],
        TaskType::ApiSecurity => Vec::new(),
    }
}

/// Group a plan into dependency layers; stages within a layer run
/// concurrently, layers run in order.
pub fn layers(plan: &[StageDef]) -> Vec<Vec<StageId>> {
    let mut done: Vec<StageId> = Vec::new();
    let mut remaining: Vec<&StageDef> = plan.iter().collect();
    let mut result = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&StageDef>, Vec<&StageDef>) = remaining
            .into_iter()
            .partition(|d| d.depends_on.iter().all(|dep| done.contains(dep)));
        if ready.is_empty() {
            // Unsatisfiable dependencies; surface the rest as one layer
            // rather than looping forever. Static plans never hit this.
            result.push(blocked.iter().map(|d| d.stage).collect());
            break;
        }
        done.extend(ready.iter().map(|d| d.stage));
        result.push(ready.iter().map(|d| d.stage).collect());
        remaining = blocked;
    }
    result
}

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
