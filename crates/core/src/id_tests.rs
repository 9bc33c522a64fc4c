// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct ProbeId;
}

#[test]
fn short_id_truncates() {
    assert_eq!("abcdef".short(3), "abc");
    assert_eq!("ab".short(3), "ab");
    assert_eq!("".short(3), "");
}

#[test]
fn defined_id_roundtrips_serde() {
    let id = ProbeId::new("scan-42");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"scan-42\"");
    let parsed: ProbeId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn defined_id_compares_with_str() {
    let id = ProbeId::new("t-1");
    assert_eq!(id, "t-1");
    assert_eq!(id.short(1), "t");
    assert_eq!(id.to_string(), "t-1");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn sequential_gen_counts_up() {
    let gen = SequentialIdGen::new("task");
    assert_eq!(gen.next(), "task-1");
    assert_eq!(gen.next(), "task-2");

    // Clones share the counter
    let clone = gen.clone();
    assert_eq!(clone.next(), "task-3");
    assert_eq!(gen.next(), "task-4");
}
