// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    domain = { "example.com", Target::Domain { name: "example.com".into() } },
    trimmed = { "  example.com ", Target::Domain { name: "example.com".into() } },
    v4 = { "10.0.0.5", Target::Ip { addr: "10.0.0.5".parse().unwrap() } },
    v6 = { "::1", Target::Ip { addr: "::1".parse().unwrap() } },
    url = { "https://example.com/app", Target::Url { url: "https://example.com/app".into() } },
)]
fn parse_classifies(raw: &str, expected: Target) {
    assert_eq!(Target::parse(raw), Some(expected));
}

#[parameterized(
    empty = { "" },
    blank = { "   " },
    pathy = { "etc/passwd" },
    spaced = { "two words" },
)]
fn parse_rejects(raw: &str) {
    assert_eq!(Target::parse(raw), None);
}

#[test]
fn host_extraction() {
    let t = Target::parse("https://user@example.com:8443/path?q=1").unwrap();
    assert_eq!(t.host(), "example.com");

    let t = Target::parse("http://[::1]:8080/x").unwrap();
    assert_eq!(t.host(), "::1");

    let t = Target::parse("192.168.1.1").unwrap();
    assert_eq!(t.host(), "192.168.1.1");
}

#[test]
fn scan_url_promotes_domains() {
    let t = Target::parse("example.com").unwrap();
    assert_eq!(t.as_scan_url().as_deref(), Some("https://example.com"));

    let t = Target::Asset {
        asset_id: "a-1".into(),
    };
    assert_eq!(t.as_scan_url(), None);
}

#[test]
fn serde_shape_is_tagged() {
    let t = Target::parse("example.com").unwrap();
    let json = serde_json::to_value(&t).unwrap();
    assert_eq!(json["kind"], "domain");
    assert_eq!(json["name"], "example.com");
}
