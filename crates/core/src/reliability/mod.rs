// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry, circuit breaking and timeouts around store calls.
//!
//! Every attempt of a wrapped call:
//! 1. asks the label's breaker for admission (`CircuitOpen` fails fast and is
//!    never retried),
//! 2. races the call against `call_timeout`,
//! 3. records the outcome on the breaker,
//! 4. sleeps with jittered exponential backoff before retrying a retryable
//!    failure.
//!
//! Only retryable failures (network, timeout, rate limit) count against a
//! breaker; any other answer proves the service is reachable.

mod backoff;
mod breaker;

pub use backoff::{backoff_delay, jittered_delay, RetryPolicy, JITTER_RATIO, MAX_BACKOFF};
pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReliabilityConfig {
    pub breaker: BreakerConfig,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        ReliabilityConfig {
            breaker: BreakerConfig::default(),
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Owner of every circuit breaker, keyed by operation label.
#[derive(Debug, Default)]
pub struct Reliability {
    config: ReliabilityConfig,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl Reliability {
    pub fn new(config: ReliabilityConfig) -> Self {
        Reliability {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitBreaker>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, label: &str) -> Result<()> {
        self.lock()
            .entry(label.to_string())
            .or_default()
            .admit(label, &self.config.breaker)
    }

    fn record(&self, label: &str, outcome: std::result::Result<(), &Error>) {
        let mut breakers = self.lock();
        let breaker = breakers.entry(label.to_string()).or_default();
        match outcome {
            Err(e) if e.is_retryable() => breaker.record_failure(label, &self.config.breaker),
            _ => breaker.record_success(label),
        }
    }

    /// Run `op` with the configured default retry policy.
    pub async fn call<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = self.config.retry;
        self.with_retry(label, policy.max_attempts, policy.base_delay, op)
            .await
    }

    /// Run `op` up to `max_attempts` times under the breaker for `label`.
    ///
    /// Non-retryable errors are returned as-is after the first attempt.
    /// Running out of attempts wraps the last error in `RetryExhausted`.
    pub async fn with_retry<T, F, Fut>(
        &self,
        label: &str,
        max_attempts: u32,
        base_delay: Duration,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.admit(label)?;

            let outcome = match tokio::time::timeout(self.config.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    label: label.to_string(),
                    timeout_ms: u64::try_from(self.config.call_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                }),
            };

            let err = match outcome {
                Ok(value) => {
                    self.record(label, Ok(()));
                    return Ok(value);
                }
                Err(e) => e,
            };
            self.record(label, Err(&err));

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                tracing::warn!("{} failed after {} attempts: {}", label, attempt, err);
                return Err(Error::RetryExhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = jittered_delay(base_delay, attempt);
            tracing::debug!(
                "{} attempt {}/{} failed ({}), retrying in {:?}",
                label,
                attempt,
                max_attempts,
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// State of the breaker for `label`; unknown labels are closed.
    pub fn breaker_state(&self, label: &str) -> CircuitState {
        self.lock()
            .get(label)
            .map(CircuitBreaker::state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Snapshots of every breaker, sorted by label.
    pub fn breakers(&self) -> Vec<(String, BreakerSnapshot)> {
        let breakers = self.lock();
        let mut snapshots: Vec<_> = breakers
            .iter()
            .map(|(label, b)| (label.clone(), b.snapshot(&self.config.breaker)))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }

    /// Returns false when no breaker exists for `label`.
    pub fn reset_circuit_breaker(&self, label: &str) -> bool {
        match self.lock().get_mut(label) {
            Some(breaker) => {
                breaker.reset();
                tracing::info!("circuit breaker for {} reset", label);
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        let mut breakers = self.lock();
        for breaker in breakers.values_mut() {
            breaker.reset();
        }
        tracing::info!("reset {} circuit breakers", breakers.len());
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
