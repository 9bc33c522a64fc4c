// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_carry_documented_values() {
    let config = Config::default();
    assert_eq!(config.scheduler.worker_count, 8);
    assert_eq!(config.scheduler.inflight_cap, 64);
    assert_eq!(config.scheduler.rate_limits.scan_create_limit, 5);
    assert_eq!(config.scheduler.rate_limits.scan_create_window_ms, 60_000);
    assert_eq!(config.engine.max_concurrent_subprocesses_per_task, 4);
    assert_eq!(config.engine.per_stage_target_concurrency, 10);
    assert_eq!(config.api_security.max_concurrent_requests, 10);
    assert_eq!(config.api_security.max_js_files, 100);
    assert_eq!(config.api_security.http_timeout_s, 30);
    assert_eq!(config.merger.evidence_cap_per_source, 5);
    assert_eq!(
        config.merger.remediation_priority,
        vec!["pattern-scan", "template-scan", "header-scan"]
    );
    assert_eq!(config.ssrf.allowed_schemes, vec!["http", "https"]);
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let toml = r#"
        [scheduler]
        worker_count = 2

        [api_security]
        max_js_files = 10

        [ssrf]
        host_denylist = ["metadata.internal"]
    "#;
    let config: Config = toml::from_str(toml).unwrap();

    assert_eq!(config.scheduler.worker_count, 2);
    // Unnamed fields keep defaults
    assert_eq!(config.scheduler.inflight_cap, 64);
    assert_eq!(config.api_security.max_js_files, 10);
    assert_eq!(config.api_security.max_concurrent_requests, 10);
    assert_eq!(config.ssrf.host_denylist, vec!["metadata.internal"]);
}

#[test]
fn tool_overrides_pass_through_untyped() {
    let toml = r#"
        [tools]
        discovery_root = "/opt/scanners"

        [tools.overrides.nuclei]
        rate_limit = 150
        templates = "cves/"
    "#;
    let config: Config = toml::from_str(toml).unwrap();

    assert_eq!(config.tools.discovery_root, PathBuf::from("/opt/scanners"));
    let nuclei = config.tools.overrides.get("nuclei").unwrap();
    assert_eq!(nuclei.get("rate_limit").and_then(|v| v.as_integer()), Some(150));
}

#[test]
fn load_missing_file_is_an_error() {
    let err = Config::load("/nonexistent/palisade.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
