// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pal_core::FakeClock;
use std::time::Duration;

fn limiter(clock: &FakeClock) -> RateLimiter<FakeClock> {
    RateLimiter::new(RateLimitConfig::default(), clock.clone())
}

#[test]
fn allows_up_to_the_limit_then_rejects() {
    // Spec scenario: 6 submissions within the window at limit 5/min.
    let clock = FakeClock::new();
    let limiter = limiter(&clock);

    for i in 0..5 {
        assert!(
            limiter.try_acquire("alice", OpClass::ScanCreate).is_ok(),
            "submission {} should be admitted",
            i + 1
        );
    }
    let retry_after = limiter
        .try_acquire("alice", OpClass::ScanCreate)
        .unwrap_err();
    assert!(retry_after > 0);

    // After the window, a new submission succeeds.
    clock.advance(Duration::from_secs(60));
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_ok());
}

#[test]
fn principals_have_independent_buckets() {
    let clock = FakeClock::new();
    let limiter = limiter(&clock);

    for _ in 0..5 {
        limiter.try_acquire("alice", OpClass::ScanCreate).unwrap();
    }
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_err());
    assert!(limiter.try_acquire("bob", OpClass::ScanCreate).is_ok());
}

#[test]
fn classes_have_independent_buckets() {
    let clock = FakeClock::new();
    let limiter = limiter(&clock);

    for _ in 0..5 {
        limiter.try_acquire("alice", OpClass::ScanCreate).unwrap();
    }
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_err());
    assert!(limiter.try_acquire("alice", OpClass::Control).is_ok());
}

#[test]
fn rejected_acquire_consumes_nothing() {
    let clock = FakeClock::new();
    let limiter = limiter(&clock);

    for _ in 0..5 {
        limiter.try_acquire("alice", OpClass::ScanCreate).unwrap();
    }
    // Hammering the empty bucket must not push recovery further out.
    let first_retry = limiter
        .try_acquire("alice", OpClass::ScanCreate)
        .unwrap_err();
    for _ in 0..10 {
        let _ = limiter.try_acquire("alice", OpClass::ScanCreate);
    }
    let later_retry = limiter
        .try_acquire("alice", OpClass::ScanCreate)
        .unwrap_err();
    assert!(later_retry <= first_retry);
}

#[test]
fn tokens_refill_continuously() {
    let clock = FakeClock::new();
    let limiter = limiter(&clock);

    for _ in 0..5 {
        limiter.try_acquire("alice", OpClass::ScanCreate).unwrap();
    }
    // One token refills after window/limit = 12s.
    clock.advance(Duration::from_secs(12));
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_ok());
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_err());
}

#[test]
fn zero_limit_always_rejects() {
    let clock = FakeClock::new();
    let config = RateLimitConfig {
        scan_create_limit: 0,
        ..RateLimitConfig::default()
    };
    let limiter = RateLimiter::new(config, clock);
    assert!(limiter.try_acquire("alice", OpClass::ScanCreate).is_err());
}
