// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket admission control per (principal, operation class).

use pal_core::{Clock, RateLimitConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// Operation classes with independent buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Scan creation (submit).
    ScanCreate,
    /// Control operations: cancel, restart, clone, delete.
    Control,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by `(principal, class)`.
///
/// A denied acquire consumes nothing; tokens refill continuously at
/// `limit / window`.
pub struct RateLimiter<C: Clock> {
    clock: C,
    config: RateLimitConfig,
    buckets: Mutex<HashMap<(String, OpClass), Bucket>>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(config: RateLimitConfig, clock: C) -> Self {
        Self {
            clock,
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn limits(&self, class: OpClass) -> (u32, u64) {
        match class {
            OpClass::ScanCreate => (
                self.config.scan_create_limit,
                self.config.scan_create_window_ms,
            ),
            OpClass::Control => (self.config.control_limit, self.config.control_window_ms),
        }
    }

    /// Take one token, or report how long until one is available.
    pub fn try_acquire(&self, principal: &str, class: OpClass) -> Result<(), u64> {
        let (limit, window_ms) = self.limits(class);
        if limit == 0 {
            return Err(window_ms);
        }
        let refill_per_ms = limit as f64 / window_ms as f64;
        let now = self.clock.now();

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry((principal.to_string(), class))
            .or_insert(Bucket {
                tokens: limit as f64,
                last_refill: now,
            });

        let elapsed_ms = now.duration_since(bucket.last_refill).as_millis() as f64;
        bucket.tokens = (bucket.tokens + elapsed_ms * refill_per_ms).min(limit as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            Err((deficit / refill_per_ms).ceil() as u64)
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
