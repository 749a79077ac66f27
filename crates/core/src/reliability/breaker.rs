// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-label circuit breaker.
//!
//! States:
//! - Closed: calls pass through, failures are counted
//! - Open: calls fail fast until the cooldown elapses
//! - HalfOpen: exactly one trial call is admitted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Thresholds shared by every breaker of a [`Reliability`](super::Reliability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// A failure further than this from the previous one restarts the count.
    pub failure_window: Duration,
    /// Time spent open before a trial call is allowed.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only view of a breaker for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    /// Remaining cooldown while open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_failure_wall: Option<DateTime<Utc>>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        CircuitBreaker {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_failure_wall: None,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

impl CircuitBreaker {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Decide whether a call may proceed now.
    ///
    /// An open breaker whose cooldown has elapsed turns half-open and admits
    /// the caller as its single trial.
    pub fn admit(&mut self, label: &str, config: &BreakerConfig) -> Result<()> {
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .map(|at| at.elapsed() >= config.cooldown)
                    .unwrap_or(true);
                if !cooled {
                    return Err(Error::CircuitOpen {
                        label: label.to_string(),
                    });
                }
                tracing::debug!("circuit breaker for {} half-open, admitting trial call", label);
                self.state = CircuitState::HalfOpen;
                self.trial_in_flight = true;
                Ok(())
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    return Err(Error::CircuitOpen {
                        label: label.to_string(),
                    });
                }
                self.trial_in_flight = true;
                Ok(())
            }
        }
    }

    pub fn record_success(&mut self, label: &str) {
        if self.state != CircuitState::Closed {
            tracing::info!("circuit breaker for {} closed, service recovered", label);
        }
        self.close();
    }

    pub fn record_failure(&mut self, label: &str, config: &BreakerConfig) {
        let now = Instant::now();
        match self.state {
            CircuitState::HalfOpen => {
                tracing::warn!("circuit breaker for {} reopened, trial call failed", label);
                self.open(now);
            }
            CircuitState::Closed => {
                let within_window = self
                    .last_failure_at
                    .map(|at| now.duration_since(at) <= config.failure_window)
                    .unwrap_or(false);
                self.consecutive_failures = if within_window {
                    self.consecutive_failures.saturating_add(1)
                } else {
                    1
                };
                if self.consecutive_failures >= config.failure_threshold {
                    tracing::warn!(
                        "circuit breaker for {} opened after {} consecutive failures",
                        label,
                        self.consecutive_failures
                    );
                    self.open(now);
                }
            }
            CircuitState::Open => {}
        }
        self.last_failure_at = Some(now);
        self.last_failure_wall = Some(Utc::now());
    }

    /// Force closed with zero failures.
    pub fn reset(&mut self) {
        self.close();
        self.last_failure_at = None;
        self.last_failure_wall = None;
    }

    pub fn snapshot(&self, config: &BreakerConfig) -> BreakerSnapshot {
        let retry_in_ms = match (self.state, self.opened_at) {
            (CircuitState::Open, Some(at)) => {
                let remaining = config.cooldown.saturating_sub(at.elapsed());
                Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };
        BreakerSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            last_failure: self.last_failure_wall,
            retry_in_ms,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
