// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync orchestration.
//!
//! A run moves through [`SyncPhase`]s in order:
//!
//! 1. **Validating** - options are checked before any I/O.
//! 2. **Fetching** - both sides are listed through their [`StoreAdapter`].
//! 3. **Matching** - items are paired by counterpart links, then by title.
//!    Copies that fell outside the listing are found by their back-link.
//! 4. **Resolving** - each divergent pair gets a winner, through the
//!    [`ConflictResolver`] when both sides changed recently.
//! 5. **Writing** - creates and updates are applied in batches; item
//!    failures are collected instead of aborting the run.
//! 6. **Reporting** - cache invalidation, counters and history.
//!
//! Only one run may be in flight per orchestrator. Status and statistics can
//! be read at any time.

mod matching;

pub use matching::{match_items, MatchPlan};

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::{Error, ErrorKind, Result};
use crate::history::SyncRecorder;
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};
use crate::options::{SyncDirection, SyncOptions, ValidatedOptions};
use crate::reliability::{BreakerSnapshot, Reliability};
use crate::resolver::ConflictResolver;
use crate::result::{duration_millis, ResolutionAction, SyncConflict, SyncRecord, SyncResult};
use crate::store::{Side, StoreAdapter};

/// Default window within which edits on both sides count as a conflict.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Strategy used to settle manual outcomes when a run is forced.
const FORCE_STRATEGY: &str = "timestamp";

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Validating,
    Fetching,
    Matching,
    Resolving,
    Writing,
    Reporting,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Validating => "validating",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Matching => "matching",
            SyncPhase::Resolving => "resolving",
            SyncPhase::Writing => "writing",
            SyncPhase::Reporting => "reporting",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pairs whose edits are further apart than this are not conflicts; the
    /// newer side simply wins.
    pub recency_window: Duration,
    /// Runs kept in memory for [`SyncStatus::recent_syncs`].
    pub history_limit: usize,
    /// In bidirectional runs, record the new counterpart on the origin item
    /// after a create.
    pub link_back: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            recency_window: DEFAULT_RECENCY_WINDOW,
            history_limit: 20,
            link_back: true,
        }
    }
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_running: bool,
    pub phase: SyncPhase,
    pub circuit_breakers: BTreeMap<String, BreakerSnapshot>,
    /// Most recent runs, oldest first.
    pub recent_syncs: Vec<SyncRecord>,
    pub success_rate: f64,
}

/// Totals over every run since the orchestrator was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub success_rate: f64,
    pub average_duration_ms: u64,
}

#[derive(Default)]
struct History {
    recent: VecDeque<SyncRecord>,
    total: u64,
    successful: u64,
    total_duration: Duration,
}

impl History {
    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// A planned store write.
#[derive(Debug, Clone)]
enum WriteOp {
    /// Copy `origin` to `side` as a new item.
    Create { side: Side, origin: Item },
    /// Patch item `id` on `side`; `counted` writes change content.
    Update {
        side: Side,
        id: String,
        patch: ItemPatch,
        counted: bool,
    },
}

/// Releases the single-flight flag and returns to idle when a run ends.
struct RunGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_phase(SyncPhase::Idle);
        self.orchestrator.running.store(false, Ordering::SeqCst);
    }
}

fn item_failure(side: Side, op: &str, id: &str, e: &Error) -> String {
    format!("{}: {} {} {}: {}", e.code(), side, op, id, e)
}

pub struct SyncOrchestrator {
    source: StoreAdapter,
    target: StoreAdapter,
    resolver: ConflictResolver,
    cache: Arc<Cache>,
    reliability: Arc<Reliability>,
    config: OrchestratorConfig,
    recorder: Option<Arc<dyn SyncRecorder>>,
    running: AtomicBool,
    phase: Mutex<SyncPhase>,
    history: Mutex<History>,
}

impl SyncOrchestrator {
    pub fn new(
        source: StoreAdapter,
        target: StoreAdapter,
        resolver: ConflictResolver,
        cache: Arc<Cache>,
        reliability: Arc<Reliability>,
        config: OrchestratorConfig,
    ) -> Self {
        SyncOrchestrator {
            source,
            target,
            resolver,
            cache,
            reliability,
            config,
            recorder: None,
            running: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
            history: Mutex::new(History::default()),
        }
    }

    /// Hand every finished run to `recorder`.
    pub fn with_recorder(mut self, recorder: Arc<dyn SyncRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SyncPhase) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != phase {
            tracing::debug!("sync phase {} -> {}", current, phase);
            *current = phase;
        }
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adapter(&self, side: Side) -> &StoreAdapter {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    /// Run one sync pass.
    ///
    /// Only [`Error::SyncInProgress`] is returned as an error; every other
    /// failure is reported through [`SyncResult::success`] and
    /// [`SyncResult::errors`].
    pub async fn execute_sync(&self, options: SyncOptions) -> Result<SyncResult> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SyncInProgress);
        }
        let _guard = RunGuard { orchestrator: self };

        let started = Instant::now();
        let counters = self.cache.counters();
        let mut result = SyncResult::start(Utc::now());
        result.dry_run = options.dry_run;

        self.set_phase(SyncPhase::Validating);
        match options.validate() {
            Ok(validated) => {
                result.direction = Some(validated.direction);
                tracing::info!(
                    "sync started: {}{}",
                    validated.direction,
                    if validated.dry_run { " (dry run)" } else { "" }
                );
                if let Some(strategy) = &validated.strategy {
                    if !self.resolver.has_strategy(strategy) {
                        tracing::warn!(
                            "unknown strategy '{}', conflicts fall back to '{}'",
                            strategy,
                            self.resolver.fallback()
                        );
                    }
                }
                if let Err(e) = self.run(&validated, &mut result).await {
                    tracing::error!("sync aborted: {}", e);
                    result.fail(e.to_entry());
                }
            }
            Err(e) => {
                tracing::warn!("sync rejected: {}", e);
                result.fail(e.to_entry());
            }
        }

        self.set_phase(SyncPhase::Reporting);
        self.report(&mut result, started, counters).await;
        Ok(result)
    }

    /// Fetch, match, resolve and write. An error aborts the run.
    async fn run(&self, options: &ValidatedOptions, result: &mut SyncResult) -> Result<()> {
        self.set_phase(SyncPhase::Fetching);
        let filter = options.filter();
        let (source_items, target_items) = tokio::try_join!(
            self.fetch(Side::Source, &filter),
            self.fetch(Side::Target, &filter)
        )?;

        self.set_phase(SyncPhase::Matching);
        let mut plan = match_items(source_items, target_items);
        self.follow_dangling(&mut plan, options, result).await?;
        self.follow_backlinks(&mut plan, options).await?;

        self.set_phase(SyncPhase::Resolving);
        let writes = self.plan_writes(&plan, options, result);
        result.items_processed = plan.pairs.len()
            + writes
                .iter()
                .filter(|op| matches!(op, WriteOp::Create { .. }))
                .count();

        if options.dry_run {
            for op in &writes {
                match op {
                    WriteOp::Create { .. } => result.items_created += 1,
                    WriteOp::Update { counted: true, .. } => result.items_updated += 1,
                    WriteOp::Update { .. } => {}
                }
            }
            tracing::info!(
                "dry run: would create {} and update {} items",
                result.items_created,
                result.items_updated
            );
            return Ok(());
        }

        self.set_phase(SyncPhase::Writing);
        for batch in writes.chunks(options.batch_size) {
            tracing::debug!("writing batch of {}", batch.len());
            for op in batch {
                self.apply(op, options.direction, result).await?;
            }
        }
        Ok(())
    }

    async fn fetch(&self, side: Side, filter: &ItemFilter) -> Result<Vec<Item>> {
        let mut items = self.adapter(side).list_items(filter).await.map_err(|e| {
            tracing::warn!("failed to list {} items: {}", side, e);
            e
        })?;
        items.retain(|i| filter.matches(i));
        tracing::debug!("fetched {} {} items", items.len(), side);
        Ok(items)
    }

    /// Pair unlinked items with a copy that links back from outside the
    /// listing.
    ///
    /// One-way runs record the link only on the copy, and the copy can fall
    /// outside `since` or the batch limit.
    async fn follow_backlinks(
        &self,
        plan: &mut MatchPlan,
        options: &ValidatedOptions,
    ) -> Result<()> {
        for side in [Side::Source, Side::Target] {
            let other = side.other();
            let writable = match other {
                Side::Source => options.direction.writes_source(),
                Side::Target => options.direction.writes_target(),
            };
            if !writable || plan.unlinked(side).is_empty() {
                continue;
            }

            let claimed: HashSet<String> = plan
                .pairs
                .iter()
                .map(|(s, t)| match other {
                    Side::Source => s.id.clone(),
                    Side::Target => t.id.clone(),
                })
                .collect();
            let mut copies: HashMap<String, Item> = HashMap::new();
            for item in self.fetch(other, &ItemFilter::unbounded()).await? {
                if claimed.contains(&item.id) {
                    continue;
                }
                if let Some(origin) = item.counterpart().map(str::to_string) {
                    copies.entry(origin).or_insert(item);
                }
            }
            if copies.is_empty() {
                continue;
            }

            let origins = std::mem::take(plan.unlinked_mut(side));
            let mut remaining = Vec::with_capacity(origins.len());
            for origin in origins {
                let Some(copy) = copies.remove(&origin.id) else {
                    remaining.push(origin);
                    continue;
                };
                if !options.labels.matches(&copy.labels) {
                    tracing::debug!(
                        "{} {} has an excluded copy {} {}, skipping",
                        side,
                        origin.id,
                        other,
                        copy.id
                    );
                    continue;
                }
                tracing::debug!("{} {} linked back from {} {}", side, origin.id, other, copy.id);
                plan.pairs.push(match side {
                    Side::Source => (origin, copy),
                    Side::Target => (copy, origin),
                });
            }
            *plan.unlinked_mut(side) = remaining;
        }
        Ok(())
    }

    /// Fetch counterparts of linked items that fell outside the listing.
    ///
    /// Only followed toward a side this run may write. A counterpart that no
    /// longer exists is skipped; deletions are not propagated.
    async fn follow_dangling(
        &self,
        plan: &mut MatchPlan,
        options: &ValidatedOptions,
        result: &mut SyncResult,
    ) -> Result<()> {
        let mut claimed: HashSet<(Side, String)> = plan
            .pairs
            .iter()
            .flat_map(|(s, t)| [(Side::Source, s.id.clone()), (Side::Target, t.id.clone())])
            .collect();

        for (side, item) in std::mem::take(&mut plan.dangling) {
            let other = side.other();
            let writable = match other {
                Side::Source => options.direction.writes_source(),
                Side::Target => options.direction.writes_target(),
            };
            let Some(counterpart_id) = item.counterpart().map(str::to_string) else {
                continue;
            };
            if !writable || claimed.contains(&(other, counterpart_id.clone())) {
                continue;
            }

            match self.adapter(other).get_item(&counterpart_id).await {
                Ok(counterpart) => {
                    if !options.labels.matches(&counterpart.labels) {
                        continue;
                    }
                    claimed.insert((other, counterpart_id));
                    plan.pairs.push(match side {
                        Side::Source => (item, counterpart),
                        Side::Target => (counterpart, item),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::info!(
                        "{} {} links to missing {} {}, skipping",
                        side,
                        item.id,
                        other,
                        counterpart_id
                    );
                }
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => result
                    .errors
                    .push(item_failure(other, "get", &counterpart_id, &e)),
            }
        }
        Ok(())
    }

    fn plan_writes(
        &self,
        plan: &MatchPlan,
        options: &ValidatedOptions,
        result: &mut SyncResult,
    ) -> Vec<WriteOp> {
        let direction = options.direction;
        let mut writes = Vec::new();

        for (source, target) in &plan.pairs {
            let winner = if source.content_eq(target) {
                None
            } else {
                match self.decide(source, target, options, result) {
                    Some(winner) => Some(winner),
                    // Unresolved conflicts are left alone this pass
                    None => continue,
                }
            };

            for side in [Side::Target, Side::Source] {
                let writable = match side {
                    Side::Source => direction.writes_source(),
                    Side::Target => direction.writes_target(),
                };
                if !writable {
                    continue;
                }
                let (current, other) = match side {
                    Side::Source => (source, target),
                    Side::Target => (target, source),
                };
                match &winner {
                    Some(winner) if !current.content_eq(winner) => writes.push(WriteOp::Update {
                        side,
                        id: current.id.clone(),
                        patch: ItemPatch::replace_content(winner).with_counterpart(other.id.clone()),
                        counted: true,
                    }),
                    _ if current.counterpart() != Some(other.id.as_str()) => {
                        writes.push(WriteOp::Update {
                            side,
                            id: current.id.clone(),
                            patch: ItemPatch::link(other.id.clone()),
                            counted: false,
                        })
                    }
                    _ => {}
                }
            }
        }

        if direction.writes_target() {
            writes.extend(plan.source_only.iter().map(|origin| WriteOp::Create {
                side: Side::Target,
                origin: origin.clone(),
            }));
        }
        if direction.writes_source() {
            writes.extend(plan.target_only.iter().map(|origin| WriteOp::Create {
                side: Side::Source,
                origin: origin.clone(),
            }));
        }
        writes
    }

    /// Pick the content a divergent pair should converge to.
    ///
    /// Returns `None` when the conflict stays unresolved.
    fn decide(
        &self,
        source: &Item,
        target: &Item,
        options: &ValidatedOptions,
        result: &mut SyncResult,
    ) -> Option<Item> {
        let mut conflict = SyncConflict::between(source, target);
        let gap = (source.updated_at - target.updated_at).abs();

        if gap.to_std().unwrap_or(Duration::ZERO) > self.config.recency_window {
            // The side without recent edits is stale
            let (action, winner) = if source.updated_at >= target.updated_at {
                (ResolutionAction::SourceWins, source)
            } else {
                (ResolutionAction::TargetWins, target)
            };
            tracing::debug!(
                "{} <-> {}: {} by recency",
                source.id,
                target.id,
                action.as_str()
            );
            conflict.resolution = Some(action);
            conflict.details = Some(serde_json::json!({ "strategy": "recency" }));
            result.resolved.push(conflict);
            return Some(winner.clone());
        }

        let mut resolution = self.resolver.resolve(&conflict, options.strategy.as_deref());
        if !resolution.success && options.force {
            resolution = self.resolver.resolve(&conflict, Some(FORCE_STRATEGY));
        }

        match resolution.data {
            Some(data) if resolution.success => {
                tracing::debug!(
                    "{} <-> {}: {} via {}",
                    source.id,
                    target.id,
                    resolution.action.as_str(),
                    resolution.strategy
                );
                conflict.resolution = Some(resolution.action);
                conflict.details = Some(serde_json::json!({ "strategy": resolution.strategy }));
                result.resolved.push(conflict);
                Some(data)
            }
            _ => {
                tracing::warn!(
                    "{} <-> {}: {}",
                    source.id,
                    target.id,
                    resolution
                        .error
                        .as_deref()
                        .unwrap_or("conflict left unresolved")
                );
                conflict.resolution = Some(ResolutionAction::Manual);
                conflict.details = resolution.details;
                result.conflicts.push(conflict);
                None
            }
        }
    }

    /// Apply one write, recording item failures in `result`.
    ///
    /// Returns an error only for systemic failures, which abort the run.
    async fn apply(&self, op: &WriteOp, direction: SyncDirection, result: &mut SyncResult) -> Result<()> {
        let absorb = |result: &mut SyncResult, entry: String, e: Error| -> Result<()> {
            if e.is_systemic() {
                return Err(e);
            }
            tracing::warn!("{}", entry);
            result.errors.push(entry);
            Ok(())
        };

        match op {
            WriteOp::Create { side, origin } => {
                let draft = ItemDraft::from_item(origin);
                let created = match self.adapter(*side).create_item(&draft).await {
                    Ok(created) => created,
                    Err(e) => {
                        let entry = item_failure(*side, "create", &origin.id, &e);
                        return absorb(result, entry, e);
                    }
                };
                result.items_created += 1;
                tracing::debug!("created {} {} from {}", side, created.id, origin.id);

                if direction == SyncDirection::Bidirectional && self.config.link_back {
                    let origin_side = side.other();
                    let patch = ItemPatch::link(created.id.clone());
                    if let Err(e) = self.adapter(origin_side).update_item(&origin.id, &patch).await {
                        let entry = item_failure(origin_side, "link", &origin.id, &e);
                        return absorb(result, entry, e);
                    }
                }
                Ok(())
            }
            WriteOp::Update {
                side,
                id,
                patch,
                counted,
            } => match self.adapter(*side).update_item(id, patch).await {
                Ok(_) => {
                    if *counted {
                        result.items_updated += 1;
                    }
                    tracing::debug!("updated {} {}", side, id);
                    Ok(())
                }
                Err(e) => {
                    let entry = item_failure(*side, if *counted { "update" } else { "link" }, id, &e);
                    absorb(result, entry, e)
                }
            },
        }
    }

    async fn report(&self, result: &mut SyncResult, started: Instant, counters: (u64, u64)) {
        for side in [Side::Source, Side::Target] {
            if let Err(e) = self.adapter(side).invalidate_written().await {
                tracing::warn!("failed to invalidate {} cache entries: {}", side, e);
            }
        }

        let (hits, misses) = self.cache.counters();
        result.cache_hits = hits.saturating_sub(counters.0);
        result.cache_misses = misses.saturating_sub(counters.1);
        result.duration = started.elapsed();

        {
            let mut history = self.history();
            history.total += 1;
            if result.success {
                history.successful += 1;
            }
            history.total_duration += result.duration;
            history.recent.push_back(result.record());
            while history.recent.len() > self.config.history_limit {
                history.recent.pop_front();
            }
        }

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record_sync_result(result) {
                tracing::warn!("failed to record sync result: {}", e);
            }
        }

        tracing::info!(
            "sync finished in {}ms: {} processed, {} created, {} updated, {} resolved, {} conflicts, {} errors",
            duration_millis(result.duration),
            result.items_processed,
            result.items_created,
            result.items_updated,
            result.resolved.len(),
            result.conflicts.len(),
            result.errors.len()
        );
    }

    pub fn get_status(&self) -> SyncStatus {
        let (recent_syncs, success_rate) = {
            let history = self.history();
            (history.recent.iter().cloned().collect(), history.success_rate())
        };
        SyncStatus {
            is_running: self.is_running(),
            phase: self.phase(),
            circuit_breakers: self.reliability.breakers().into_iter().collect(),
            recent_syncs,
            success_rate,
        }
    }

    pub fn get_statistics(&self) -> SyncStatistics {
        let history = self.history();
        let average = u32::try_from(history.total)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| history.total_duration / n)
            .unwrap_or(Duration::ZERO);
        SyncStatistics {
            total_syncs: history.total,
            successful_syncs: history.successful,
            success_rate: history.success_rate(),
            average_duration_ms: duration_millis(average),
        }
    }

    /// Close every circuit breaker.
    pub fn reset_circuit_breaker(&self) {
        self.reliability.reset_all();
        tracing::info!("circuit breakers reset");
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
