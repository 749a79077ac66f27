// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod cache;
pub mod history;
pub mod status;
pub mod strategies;
pub mod sync;

use std::sync::Arc;

use wb_core::cache::{CacheBackend, DiskBackend, HybridBackend, MemoryBackend};
use wb_core::store::{CommandStore, FallbackStore, FileStore, GitHubConfig, GitHubStore};
use wb_core::{
    Cache, ConflictResolver, IssueStore, JsonlRecorder, OrchestratorConfig, Reliability, Side,
    StoreAdapter, SyncOrchestrator,
};

use crate::config::{CacheBackendKind, Config};
use crate::env;
use crate::error::{Error, Result};

/// Opens the configured cache backend.
pub fn open_cache(config: &Config) -> Result<Cache> {
    let backend: Box<dyn CacheBackend> = match config.cache.backend {
        CacheBackendKind::Memory => Box::new(MemoryBackend::new()),
        CacheBackendKind::Disk => Box::new(DiskBackend::open(&config.cache_dir())?),
        CacheBackendKind::Hybrid => Box::new(HybridBackend::open(
            &config.cache_dir(),
            config.cache.hot_entries,
        )?),
    };
    Ok(Cache::new(backend, config.cache_ttl()))
}

/// GitHub client for `[source]`.
pub fn source_store(config: &Config) -> Result<Arc<dyn IssueStore>> {
    let source = &config.source;
    if !source.is_configured() {
        return Err(Error::SourceNotConfigured);
    }

    let mut github = GitHubConfig::new(&source.owner, &source.repo).with_api_url(&source.api_url);
    github.timeout = config.reliability_config().call_timeout;
    match env::token(&source.token_env) {
        Some(token) => github = github.with_token(token),
        None => tracing::warn!(
            "{} is not set, GitHub requests are unauthenticated",
            source.token_env
        ),
    }
    Ok(Arc::new(GitHubStore::new(github)?))
}

/// Tracker binary for `[target]`, falling back to the JSONL file if one is
/// configured.
pub fn target_store(config: &Config) -> Result<Arc<dyn IssueStore>> {
    let target = &config.target;
    let mut command = CommandStore::new(&target.binary);
    if let Some(dir) = &target.dir {
        command = command.with_dir(config.resolve(dir));
    }

    let fallback = match config.fallback_path() {
        Some(path) => Some(Arc::new(FileStore::new(path, &target.prefix)?) as Arc<dyn IssueStore>),
        None => None,
    };
    Ok(Arc::new(FallbackStore::new(Arc::new(command), fallback)))
}

/// Registry with the configured fallback strategy.
pub fn resolver(config: &Config) -> Result<ConflictResolver> {
    let resolver = ConflictResolver::new(&config.sync.strategy);
    if !resolver.has_strategy(&config.sync.strategy) {
        return Err(Error::Config(format!(
            "unknown strategy '{}'\n  hint: run 'wokbridge strategies' to list them",
            config.sync.strategy
        )));
    }
    Ok(resolver)
}

pub fn recorder(config: &Config) -> JsonlRecorder {
    JsonlRecorder::new(config.history_path())
}

/// Wires stores, cache, reliability and history into an orchestrator.
pub fn build_orchestrator(config: &Config) -> Result<SyncOrchestrator> {
    let resolver = resolver(config)?;
    let cache = Arc::new(open_cache(config)?);
    let reliability = Arc::new(Reliability::new(config.reliability_config()));

    let source = StoreAdapter::new(
        Side::Source,
        source_store(config)?,
        Arc::clone(&cache),
        Arc::clone(&reliability),
    );
    let target = StoreAdapter::new(
        Side::Target,
        target_store(config)?,
        Arc::clone(&cache),
        Arc::clone(&reliability),
    );

    let orchestrator_config = OrchestratorConfig {
        recency_window: config.recency_window(),
        history_limit: config.history.limit,
        link_back: config.sync.link_back,
    };

    Ok(
        SyncOrchestrator::new(source, target, resolver, cache, reliability, orchestrator_config)
            .with_recorder(Arc::new(recorder(config))),
    )
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
