// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake_dns::FakeResolver;
use super::*;
use std::sync::Arc;
use yare::parameterized;

fn validator() -> (Arc<FakeResolver>, UrlValidator) {
    let resolver = Arc::new(FakeResolver::new());
    let validator = UrlValidator::with_resolver(SsrfConfig::default(), resolver.clone());
    (resolver, validator)
}

#[parameterized(
    loopback_v4 = { "127.0.0.1", false },
    loopback_v6 = { "::1", false },
    private_10 = { "10.0.0.5", false },
    private_172 = { "172.16.4.1", false },
    private_192 = { "192.168.1.1", false },
    link_local = { "169.254.169.254", false },
    shared_cgnat = { "100.64.0.1", false },
    benchmarking = { "198.18.0.1", false },
    reserved_high = { "240.0.0.1", false },
    documentation = { "192.0.2.1", false },
    unique_local_v6 = { "fd00::1", false },
    link_local_v6 = { "fe80::1", false },
    doc_v6 = { "2001:db8::1", false },
    mapped_private = { "::ffff:10.0.0.5", false },
    public_v4 = { "93.184.216.34", true },
    public_v6 = { "2606:2800:220:1::1", true },
)]
fn address_classes(raw: &str, global: bool) {
    let addr: std::net::IpAddr = raw.parse().unwrap();
    assert_eq!(is_global(&addr), global);
}

#[test]
fn syntax_rejects_bad_scheme() {
    let (_, v) = validator();
    assert!(matches!(
        v.check_syntax("ftp://example.com/"),
        Err(UrlValidationError::SchemeNotAllowed(_))
    ));
    assert!(matches!(
        v.check_syntax("file:///etc/passwd"),
        Err(UrlValidationError::SchemeNotAllowed(_))
    ));
}

#[test]
fn syntax_rejects_malformed() {
    let (_, v) = validator();
    assert!(matches!(
        v.check_syntax("not a url"),
        Err(UrlValidationError::Malformed(_))
    ));
}

#[test]
fn syntax_rejects_disallowed_port() {
    let (_, v) = validator();
    assert!(matches!(
        v.check_syntax("http://example.com:6379/"),
        Err(UrlValidationError::PortNotAllowed(6379))
    ));
    // Default ports for allowed schemes pass
    assert!(v.check_syntax("https://example.com/").is_ok());
    assert!(v.check_syntax("http://example.com:8080/x").is_ok());
}

#[test]
fn syntax_rejects_literal_private_address() {
    let (_, v) = validator();
    assert!(matches!(
        v.check_syntax("http://10.0.0.5/admin"),
        Err(UrlValidationError::NonRoutable(_))
    ));
    assert!(matches!(
        v.check_syntax("http://[::1]/"),
        Err(UrlValidationError::NonRoutable(_))
    ));
}

#[test]
fn denylist_covers_host_and_subdomains() {
    let resolver = Arc::new(FakeResolver::new());
    let config = SsrfConfig {
        host_denylist: vec!["corp.internal".to_string()],
        ..SsrfConfig::default()
    };
    let v = UrlValidator::with_resolver(config, resolver);

    assert!(matches!(
        v.check_syntax("https://corp.internal/"),
        Err(UrlValidationError::DenyListed(_))
    ));
    assert!(matches!(
        v.check_syntax("https://admin.corp.internal/"),
        Err(UrlValidationError::DenyListed(_))
    ));
    assert!(v.check_syntax("https://notcorp.internal.example.com/").is_ok());
}

#[tokio::test]
async fn post_resolution_recheck_rejects_internal_targets() {
    // A public-looking hostname resolving to a private address is the SSRF
    // case the validator exists for.
    let (resolver, v) = validator();
    resolver.record("internal-admin.corp.example", vec!["10.0.0.5".parse().unwrap()]);

    let err = v.validate("http://internal-admin.corp.example/").await.unwrap_err();
    assert!(matches!(err, UrlValidationError::NonRoutable(addr) if addr.to_string() == "10.0.0.5"));
}

#[tokio::test]
async fn any_private_address_in_the_set_rejects() {
    let (resolver, v) = validator();
    resolver.record(
        "dual.example",
        vec!["93.184.216.34".parse().unwrap(), "192.168.0.9".parse().unwrap()],
    );
    assert!(v.validate("https://dual.example/").await.is_err());
}

#[tokio::test]
async fn public_resolution_is_accepted() {
    let (resolver, v) = validator();
    resolver.record("example.com", vec!["93.184.216.34".parse().unwrap()]);
    let url = v.validate("https://example.com/app").await.unwrap();
    assert_eq!(url.host_str(), Some("example.com"));
}

#[tokio::test]
async fn resolution_failure_is_an_error() {
    let (_, v) = validator();
    let err = v.validate("https://unknown.example/").await.unwrap_err();
    assert!(matches!(err, UrlValidationError::Resolution { .. }));
}

#[tokio::test]
async fn literal_public_ip_skips_resolution() {
    let (_, v) = validator();
    assert!(v.validate("https://93.184.216.34/").await.is_ok());
}
