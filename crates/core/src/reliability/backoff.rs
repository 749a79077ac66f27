// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with bounded jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on any single retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Largest jitter, as a fraction of the exponential delay.
pub const JITTER_RATIO: f64 = 0.1;

/// How many times to try a call and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Delay before retrying after failed attempt `attempt` (1-based).
///
/// `base * 2^(attempt-1) * (1 + jitter_fraction)`, with the fraction clamped
/// to `[0, JITTER_RATIO]` and the result capped at [`MAX_BACKOFF`].
pub fn backoff_delay(base: Duration, attempt: u32, jitter_fraction: f64) -> Duration {
    let exponent = attempt.max(1) - 1;
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    let exponential = base.saturating_mul(factor).min(MAX_BACKOFF);

    let jitter = if jitter_fraction.is_finite() {
        jitter_fraction.clamp(0.0, JITTER_RATIO)
    } else {
        0.0
    };
    let extra_nanos = (exponential.as_nanos() as f64 * jitter) as u64;
    exponential
        .saturating_add(Duration::from_nanos(extra_nanos))
        .min(MAX_BACKOFF)
}

/// [`backoff_delay`] with a random jitter fraction.
pub fn jittered_delay(base: Duration, attempt: u32) -> Duration {
    let fraction = rand::thread_rng().gen_range(0.0..=JITTER_RATIO);
    backoff_delay(base, attempt, fraction)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
