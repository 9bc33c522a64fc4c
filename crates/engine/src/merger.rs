// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deduplication and reconciliation of findings across tool sources.

use indexmap::IndexMap;
use pal_core::{Evidence, Finding, Fingerprint, MergerConfig, Provenance};
use serde::Serialize;
use std::collections::HashMap;

/// Merger statistics, returned alongside the canonical findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeStats {
    pub input_count: usize,
    pub merged_count: usize,
    /// Fraction of inputs folded away: `1 - merged/input`. 0.0 when empty.
    pub dedup_ratio: f64,
    pub by_source: HashMap<String, usize>,
}

/// Per-task merger. Folds findings by fingerprint; never shared across
/// tasks.
///
/// Determinism: for a fixed input set all merged attributes are
/// order-independent except `title`, which keeps the first-seen value.
pub struct VulnerabilityMerger {
    config: MergerConfig,
    merged: IndexMap<Fingerprint, Finding>,
    input_count: usize,
    by_source: HashMap<String, usize>,
}

impl VulnerabilityMerger {
    pub fn new(config: MergerConfig) -> Self {
        Self {
            config,
            merged: IndexMap::new(),
            input_count: 0,
            by_source: HashMap::new(),
        }
    }

    /// Fold one finding into the set, keyed by its fingerprint.
    pub fn add(&mut self, finding: Finding, source: &str, observed_at_ms: u64) {
        self.input_count += 1;
        *self.by_source.entry(source.to_string()).or_insert(0) += 1;

        let fingerprint = finding.fingerprint();
        match self.merged.get_mut(&fingerprint) {
            None => {
                let mut finding = finding;
                self.cap_evidence(&mut finding);
                if !finding.provenance.iter().any(|p| p.source == source) {
                    finding.provenance.push(Provenance {
                        source: source.to_string(),
                        observed_at_ms,
                    });
                }
                self.merged.insert(fingerprint, finding);
            }
            Some(existing) => {
                Self::fold(existing, finding, source, observed_at_ms, &self.config);
            }
        }
    }

    /// Merge `incoming` into `existing` (same fingerprint).
    fn fold(
        existing: &mut Finding,
        incoming: Finding,
        source: &str,
        observed_at_ms: u64,
        config: &MergerConfig,
    ) {
        // Severity: the maximum asserted by any contributing source.
        existing.severity = existing.severity.max(incoming.severity);

        // Confidence: max.
        if incoming.confidence > existing.confidence {
            existing.confidence = incoming.confidence;
        }

        // Description: prefer the longer (proxy for information content).
        if incoming.description.len() > existing.description.len() {
            existing.description = incoming.description;
        }

        // References and tags: set-union, preserving first-seen order.
        for reference in incoming.references {
            if !existing.references.contains(&reference) {
                existing.references.push(reference);
            }
        }
        for tag in incoming.tags {
            if !existing.tags.contains(&tag) {
                existing.tags.push(tag);
            }
        }

        // Evidence: one list per contributing source, capped per source.
        let cap = config.evidence_cap_per_source;
        for piece in incoming.evidence {
            let from_source = existing
                .evidence
                .iter()
                .filter(|e| e.source == piece.source)
                .count();
            if from_source < cap && !existing.evidence.contains(&piece) {
                existing.evidence.push(piece);
            }
        }

        // Remediation: prefer non-empty; when both set, the configured
        // source priority decides.
        match (&existing.remediation, &incoming.remediation) {
            (None, Some(_)) => existing.remediation = incoming.remediation,
            (Some(_), Some(_)) => {
                let current_rank = source_rank(&existing.source, config);
                let incoming_rank = source_rank(&incoming.source, config);
                if incoming_rank < current_rank {
                    existing.remediation = incoming.remediation;
                }
            }
            _ => {}
        }

        // Provenance: append, deduplicated by source.
        if !existing.provenance.iter().any(|p| p.source == source) {
            existing.provenance.push(Provenance {
                source: source.to_string(),
                observed_at_ms,
            });
        }
    }

    fn cap_evidence(&self, finding: &mut Finding) {
        let cap = self.config.evidence_cap_per_source;
        let mut per_source: HashMap<String, usize> = HashMap::new();
        finding.evidence.retain(|piece| {
            let count = per_source.entry(piece.source.clone()).or_insert(0);
            *count += 1;
            *count <= cap
        });
    }

    /// The canonical merged findings, in first-seen fingerprint order.
    pub fn merged(&self) -> Vec<Finding> {
        self.merged.values().cloned().collect()
    }

    pub fn statistics(&self) -> MergeStats {
        let merged_count = self.merged.len();
        let dedup_ratio = if self.input_count == 0 {
            0.0
        } else {
            1.0 - (merged_count as f64 / self.input_count as f64)
        };
        MergeStats {
            input_count: self.input_count,
            merged_count,
            dedup_ratio,
            by_source: self.by_source.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

/// Position in the remediation priority list; unlisted sources rank last.
fn source_rank(source: &str, config: &MergerConfig) -> usize {
    config
        .remediation_priority
        .iter()
        .position(|s| s == source)
        .unwrap_or(usize::MAX)
}

/// Convenience for tests and callers holding loose evidence.
pub fn evidence(source: &str, content: &str) -> Evidence {
    Evidence {
        source: source.to_string(),
        content: content.to_string(),
    }
}

#[cfg(test)]
#[path = "merger_tests.rs"]
mod tests;
