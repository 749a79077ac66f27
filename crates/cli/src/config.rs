// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge configuration management.
//!
//! Configuration is stored in `wokbridge.toml` and found, in order, at:
//! - the path given with `--config`
//! - the path in `$WOKBRIDGE_CONFIG`
//! - `wokbridge.toml` in the current directory
//!
//! Every section and key has a default, so an empty file (or no file at all)
//! is a valid configuration. Relative paths resolve against the directory
//! holding the config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wb_core::options::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use wb_core::store::validate_prefix;
use wb_core::{
    BreakerConfig, LabelFilter, ReliabilityConfig, RetryPolicy, SyncDirection, SyncOptions,
};

use crate::cli::SyncArgs;
use crate::env;
use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "wokbridge.toml";

/// Contents of `wokbridge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub reliability: ReliabilitySettings,
    pub history: HistoryConfig,
    pub log: LogConfig,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// The GitHub repository issues are read from and written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    pub api_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            owner: String::new(),
            repo: String::new(),
            token_env: "GITHUB_TOKEN".to_string(),
            api_url: "https://api.github.com".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }
}

/// The local tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Tracker binary, looked up on `PATH` unless it contains a separator.
    pub binary: String,
    /// Working directory for the binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// JSONL file used once the binary turns out to be unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_file: Option<PathBuf>,
    /// Id prefix for items created in the fallback file.
    pub prefix: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            binary: "wok".to_string(),
            dir: None,
            fallback_file: None,
            prefix: "wb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub direction: String,
    /// Strategy used when neither the run nor the conflict names one.
    pub strategy: String,
    pub batch_size: usize,
    pub recency_window_secs: u64,
    /// Record the new counterpart on the origin item after a create.
    pub link_back: bool,
    pub labels_include: Vec<String>,
    pub labels_exclude: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            direction: SyncDirection::Bidirectional.as_str().to_string(),
            strategy: wb_core::resolver::DEFAULT_FALLBACK.to_string(),
            batch_size: wb_core::options::DEFAULT_BATCH_SIZE,
            recency_window_secs: 300,
            link_back: true,
            labels_include: Vec::new(),
            labels_exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    #[default]
    Disk,
    /// Only entries beyond `hot_entries` outlive the process.
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub dir: PathBuf,
    pub ttl_secs: u64,
    /// Entries the hybrid backend keeps in memory.
    pub hot_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: CacheBackendKind::Disk,
            dir: PathBuf::from(".wokbridge/cache"),
            ttl_secs: 300,
            hot_entries: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReliabilitySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub failure_threshold: u32,
    pub failure_window_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for ReliabilitySettings {
    fn default() -> Self {
        ReliabilitySettings {
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_secs: 30,
            failure_threshold: 5,
            failure_window_secs: 60,
            cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub file: PathBuf,
    /// Runs kept in memory for status output.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            file: PathBuf::from(".wokbridge/history.jsonl"),
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Append logs here instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Config {
    /// Loads and validates the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parses and validates TOML text; relative paths stay relative.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Locates the config file; defaults apply when there is none.
    ///
    /// An explicit path (flag or environment) must exist.
    pub fn find(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit.map(Path::to_path_buf).or_else(env::config_path) {
            return Self::load(&path);
        }

        let cwd = std::env::current_dir()?;
        let candidate = cwd.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::load(&candidate);
        }

        tracing::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Config {
            base_dir: cwd,
            ..Config::default()
        })
    }

    fn validate(&self) -> Result<()> {
        self.sync
            .direction
            .parse::<SyncDirection>()
            .map_err(|e| Error::Config(format!("sync.direction: {}", e)))?;

        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.sync.batch_size) {
            return Err(Error::Config(format!(
                "sync.batch_size must be between {} and {}",
                MIN_BATCH_SIZE, MAX_BATCH_SIZE
            )));
        }
        if self.sync.strategy.trim().is_empty() {
            return Err(Error::Config("sync.strategy cannot be empty".to_string()));
        }
        if self.target.binary.trim().is_empty() {
            return Err(Error::Config("target.binary cannot be empty".to_string()));
        }
        if self.target.fallback_file.is_some() && !validate_prefix(&self.target.prefix) {
            return Err(Error::Config(
                "target.prefix must be 2+ lowercase alphanumeric with at least one letter"
                    .to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache.ttl_secs must be positive".to_string()));
        }
        if self.reliability.max_attempts == 0 {
            return Err(Error::Config(
                "reliability.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reliability.timeout_secs == 0 {
            return Err(Error::Config(
                "reliability.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Joins a relative path onto the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache.dir)
    }

    pub fn history_path(&self) -> PathBuf {
        self.resolve(&self.history.file)
    }

    pub fn fallback_path(&self) -> Option<PathBuf> {
        self.target.fallback_file.as_deref().map(|p| self.resolve(p))
    }

    /// Log destination: `$WOKBRIDGE_LOG_FILE` wins over `log.file`.
    pub fn log_path(&self) -> Option<PathBuf> {
        env::log_file().or_else(|| self.log.file.as_deref().map(|p| self.resolve(p)))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.sync.recency_window_secs)
    }

    pub fn reliability_config(&self) -> ReliabilityConfig {
        let r = &self.reliability;
        ReliabilityConfig {
            breaker: BreakerConfig {
                failure_threshold: r.failure_threshold,
                failure_window: Duration::from_secs(r.failure_window_secs),
                cooldown: Duration::from_secs(r.cooldown_secs),
            },
            call_timeout: Duration::from_secs(r.timeout_secs),
            retry: RetryPolicy {
                max_attempts: r.max_attempts,
                base_delay: Duration::from_millis(r.base_delay_ms),
            },
        }
    }

    pub fn label_filter(&self) -> LabelFilter {
        LabelFilter {
            include: self.sync.labels_include.iter().cloned().collect::<BTreeSet<_>>(),
            exclude: self.sync.labels_exclude.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }

    /// Merges command-line overrides into the configured defaults.
    ///
    /// Values are passed through unchecked; the orchestrator validates them
    /// and reports problems in the run result.
    pub fn sync_options(&self, args: &SyncArgs) -> SyncOptions {
        SyncOptions {
            direction: args
                .direction
                .clone()
                .unwrap_or_else(|| self.sync.direction.clone()),
            dry_run: args.dry_run,
            force: args.force,
            since: args.since.clone(),
            batch_size: args.batch_size.unwrap_or(self.sync.batch_size),
            strategy: args.strategy.clone(),
            labels: self.label_filter(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
