// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Options accepted by a sync run and their validation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::item::{ItemFilter, LabelFilter};

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Which side originates changes in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    SourceToTarget,
    TargetToSource,
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::SourceToTarget => "source-to-target",
            SyncDirection::TargetToSource => "target-to-source",
            SyncDirection::Bidirectional => "bidirectional",
        }
    }

    /// True when this run may write to the target tracker.
    pub fn writes_target(&self) -> bool {
        !matches!(self, SyncDirection::TargetToSource)
    }

    /// True when this run may write to the source tracker.
    pub fn writes_source(&self) -> bool {
        !matches!(self, SyncDirection::SourceToTarget)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "source-to-target" => Ok(SyncDirection::SourceToTarget),
            "target-to-source" => Ok(SyncDirection::TargetToSource),
            "bidirectional" => Ok(SyncDirection::Bidirectional),
            _ => Err(Error::validation(
                "direction",
                format!(
                    "'{}' is not one of: source-to-target, target-to-source, bidirectional",
                    s
                ),
            )),
        }
    }
}

/// Caller-supplied options for one sync run.
///
/// `direction` and `since` are kept as strings so that bad input surfaces as a
/// validation error in the result instead of failing at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub direction: String,
    #[serde(default)]
    pub dry_run: bool,
    /// Resolve conflicts that would need manual attention with `timestamp`.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub since: Option<String>,
    pub batch_size: usize,
    /// Conflict strategy override for this run.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub labels: LabelFilter,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            direction: SyncDirection::Bidirectional.as_str().to_string(),
            dry_run: false,
            force: false,
            since: None,
            batch_size: DEFAULT_BATCH_SIZE,
            strategy: None,
            labels: LabelFilter::default(),
        }
    }
}

impl SyncOptions {
    pub fn new(direction: SyncDirection) -> Self {
        SyncOptions {
            direction: direction.as_str().to_string(),
            ..SyncOptions::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Check every option before any I/O happens.
    pub fn validate(&self) -> Result<ValidatedOptions> {
        let direction = self.direction.parse::<SyncDirection>()?;

        let since = match self.since.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_instant(raw)?),
        };

        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(Error::validation(
                "batchSize",
                format!(
                    "{} is out of range (must be between {} and {})",
                    self.batch_size, MIN_BATCH_SIZE, MAX_BATCH_SIZE
                ),
            ));
        }

        let strategy = match self.strategy.as_deref().map(str::trim) {
            Some("") => {
                return Err(Error::validation("strategy", "cannot be empty"));
            }
            other => other.map(str::to_string),
        };

        Ok(ValidatedOptions {
            direction,
            dry_run: self.dry_run,
            force: self.force,
            since,
            batch_size: self.batch_size,
            strategy,
            labels: self.labels.clone(),
        })
    }
}

/// Options that passed [`SyncOptions::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub force: bool,
    pub since: Option<DateTime<Utc>>,
    pub batch_size: usize,
    pub strategy: Option<String>,
    pub labels: LabelFilter,
}

impl ValidatedOptions {
    /// The read filter both sides are fetched with.
    pub fn filter(&self) -> ItemFilter {
        ItemFilter {
            since: self.since,
            limit: self.batch_size,
            labels: self.labels.clone(),
        }
    }
}

/// Parse an RFC 3339 instant, or a bare `YYYY-MM-DD` date as midnight UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            Error::validation(
                "since",
                format!("'{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", raw),
            )
        })
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
