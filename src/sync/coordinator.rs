//! Refresh coordinator.
//!
//! Drives one alias through `Idle -> Connecting -> Connected -> Syncing -> Disconnecting
//! -> Idle`, or into `Failed` when the remote cannot be reached or listed. The
//! watermark only moves after a cycle that finished without connection loss, user
//! stop or unsaved batches, and it moves to the cycle's start rather than its end.

use crate::config::SyncOptions;
use crate::error::{CacheError, CacheResult};
use crate::models::{CacheCounts, CacheDatabase, ObjectKind};
use crate::remote::{CatalogSession, CatalogSource, QueryShape, queries};
use crate::store::{CacheStore, PurgeReport};
use crate::sync::{
    BatchHandler, CatalogLister, DetailFetcher, KindQueue, KindWorker, ListingReport, SyncState,
    WorkerConfig, WorkerReport,
};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Only objects changed since the stored watermark.
    #[default]
    Incremental,
    /// Every object, ignoring the watermark.
    Full,
    /// Purge and compact the cache, then refresh everything.
    Vacuum,
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::Vacuum => "vacuum",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Syncing,
    Disconnecting,
    Failed,
}

impl std::fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Syncing => "syncing",
            Self::Disconnecting => "disconnecting",
            Self::Failed => "failed",
        })
    }
}

/// How a cycle that reached the end of `Syncing` went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshOutcome {
    /// Watermark advanced.
    Completed,
    /// Some batches could not be saved. Watermark kept.
    Degraded,
    /// Stopped on request. Watermark kept.
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub alias: String,
    pub mode: RefreshMode,
    pub outcome: RefreshOutcome,
    pub cycle_start: DateTime<Utc>,
    pub listing: ListingReport,
    /// One report per worker, in kind order.
    pub workers: Vec<WorkerReport>,
    pub watermark_advanced: bool,
    /// Rows removed before syncing, after an identifier change or in vacuum mode.
    pub purged: Option<PurgeReport>,
}

impl RefreshSummary {
    pub fn failed_batches(&self) -> usize {
        self.workers.iter().map(|w| w.failed_batches).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub in_progress: bool,
    pub phase: RefreshPhase,
    pub last_refreshed: Option<DateTime<Utc>>,
}

enum TaskOutput {
    Listing(CacheResult<ListingReport>),
    Worker(WorkerReport),
}

/// What `Syncing` produced, before the watermark decision.
struct CycleResult {
    listing: ListingReport,
    workers: Vec<WorkerReport>,
    cycle_start: DateTime<Utc>,
    previous_watermark: Option<DateTime<Utc>>,
    purged: Option<PurgeReport>,
}

/// The database row after reconciling it with the remote identity.
struct Reconciled {
    /// Watermark in force for this cycle.
    watermark: Option<DateTime<Utc>>,
    /// Set when an identifier change emptied the cache.
    purged: Option<PurgeReport>,
    /// Remote clock at identity time.
    remote_now: Option<NaiveDateTime>,
}

/// Clears the in-progress flag however the guarded operation ends.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    alias: String,
    source: Arc<dyn CatalogSource>,
    store: CacheStore,
    options: Arc<SyncOptions>,
    phase: RwLock<RefreshPhase>,
    in_progress: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl RefreshCoordinator {
    pub fn new(
        alias: impl Into<String>,
        source: Arc<dyn CatalogSource>,
        store: CacheStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            alias: alias.into(),
            source,
            store,
            options: Arc::new(options),
            phase: RwLock::new(RefreshPhase::Idle),
            in_progress: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn phase(&self) -> RefreshPhase {
        *self.phase.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: RefreshPhase) {
        *self.phase.write().unwrap_or_else(|e| e.into_inner()) = phase;
        info!(alias = %self.alias, phase = %phase, component = "coordinator", "Phase changed");
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn begin_exclusive(&self, operation: &str) -> CacheResult<InProgress<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                CacheError::invalid_input(format!(
                    "Cannot {operation} '{}': a refresh is already in progress",
                    self.alias
                ))
            })?;
        Ok(InProgress(&self.in_progress))
    }

    /// Claim the coordinator for a cycle and install its stop token. Both happen under
    /// the token lock, so a `stop()` that sees the cycle in progress also sees its token.
    fn begin_cycle(&self) -> CacheResult<(InProgress<'_>, CancellationToken)> {
        let mut slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        let guard = self.begin_exclusive("refresh")?;
        let cancel = CancellationToken::new();
        *slot = cancel.clone();
        Ok((guard, cancel))
    }

    /// Ask the running cycle to stop. Workers finish their in-flight batch first.
    pub fn stop(&self) {
        let token = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_in_progress() {
            info!(alias = %self.alias, component = "coordinator", "Stop requested");
        }
        token.cancel();
    }

    pub async fn status(&self) -> CacheResult<RefreshStatus> {
        let last_refreshed = self
            .store
            .find_database(&self.alias)
            .await?
            .and_then(|db| db.last_refresh);
        Ok(RefreshStatus {
            in_progress: self.is_in_progress(),
            phase: self.phase(),
            last_refreshed,
        })
    }

    pub async fn counts(&self) -> CacheResult<CacheCounts> {
        self.store.counts().await
    }

    /// Drop every cached row and forget the watermark.
    pub async fn clear(&self) -> CacheResult<PurgeReport> {
        let _guard = self.begin_exclusive("clear")?;
        let report = self.store.purge_all().await?;
        if self.store.find_database(&self.alias).await?.is_some() {
            self.store.set_watermark(&self.alias, None).await?;
        }
        info!(
            alias = %self.alias,
            rows = report.total(),
            component = "coordinator",
            "Cache cleared"
        );
        Ok(report)
    }

    /// Run one refresh cycle.
    pub async fn refresh(&self, mode: RefreshMode) -> CacheResult<RefreshSummary> {
        self.options.validate()?;
        let (_guard, cancel) = self.begin_cycle()?;

        info!(alias = %self.alias, mode = %mode, component = "coordinator", "Refresh started");
        match self.run_cycle(mode, &cancel).await {
            Ok(summary) => {
                self.set_phase(RefreshPhase::Idle);
                info!(
                    alias = %self.alias,
                    outcome = ?summary.outcome,
                    listed = summary.listing.listed,
                    failed_batches = summary.failed_batches(),
                    watermark_advanced = summary.watermark_advanced,
                    component = "coordinator",
                    "Refresh finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.set_phase(RefreshPhase::Failed);
                error!(alias = %self.alias, error = %e, component = "coordinator", "Refresh failed");
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        mode: RefreshMode,
        cancel: &CancellationToken,
    ) -> CacheResult<RefreshSummary> {
        self.set_phase(RefreshPhase::Connecting);
        let session = self.source.connect().await?;
        self.set_phase(RefreshPhase::Connected);

        let result = self.sync(session.clone(), mode, cancel).await;

        self.set_phase(RefreshPhase::Disconnecting);
        session.close().await;
        let cycle = result?;

        let outcome = outcome(&cycle.workers, cancel.is_cancelled());
        let watermark_advanced = outcome == RefreshOutcome::Completed;
        if watermark_advanced {
            let next = cycle
                .previous_watermark
                .map_or(cycle.cycle_start, |prev| prev.max(cycle.cycle_start));
            self.store.set_watermark(&self.alias, Some(next)).await?;
        } else {
            warn!(
                alias = %self.alias,
                outcome = ?outcome,
                component = "coordinator",
                "Watermark left unchanged"
            );
        }

        Ok(RefreshSummary {
            alias: self.alias.clone(),
            mode,
            outcome,
            cycle_start: cycle.cycle_start,
            listing: cycle.listing,
            workers: cycle.workers,
            watermark_advanced,
            purged: cycle.purged,
        })
    }

    /// Reconcile the database row with the remote identity.
    ///
    /// Returns the watermark in force and, on an identifier change, what was purged.
    async fn reconcile(&self, session: &dyn CatalogSession) -> CacheResult<Reconciled> {
        let statement = queries::identity(session.placeholder_style())
            .with_prefetch(self.options.prefetch_for(QueryShape::Identity));
        let rows = session.fetch_all(&statement).await?;
        let row = rows.first().ok_or_else(|| {
            CacheError::remote_query("Identity query returned no rows", None)
                .with_shape(QueryShape::Identity)
        })?;
        let dbid = row.int("DBID").ok_or_else(|| {
            CacheError::remote_query("Identity query returned no DBID", None)
                .with_shape(QueryShape::Identity)
        })?;
        let version = row.string("VERSION").unwrap_or_default();
        let remote_now = row.date("NOW");

        let (watermark, purged) = match self.store.find_database(&self.alias).await? {
            None => {
                info!(alias = %self.alias, dbid, version = %version, component = "coordinator", "New database");
                self.store
                    .insert_database(&CacheDatabase::new(&self.alias, dbid, &version))
                    .await?;
                (None, None)
            }
            Some(db) if db.dbid != dbid => {
                warn!(
                    alias = %self.alias,
                    previous = db.dbid,
                    current = dbid,
                    component = "coordinator",
                    "Database identifier changed, purging cache"
                );
                let purged = self.store.purge_all().await?;
                self.store.set_watermark(&self.alias, None).await?;
                self.store.update_identity(&self.alias, dbid, &version).await?;
                (None, Some(purged))
            }
            Some(db) => {
                if db.version != version {
                    info!(
                        alias = %self.alias,
                        previous = %db.version,
                        current = %version,
                        component = "coordinator",
                        "Database version changed"
                    );
                    self.store.update_identity(&self.alias, dbid, &version).await?;
                }
                (db.last_refresh, None)
            }
        };

        Ok(Reconciled {
            watermark,
            purged,
            remote_now,
        })
    }

    async fn sync(
        &self,
        session: Arc<dyn CatalogSession>,
        mode: RefreshMode,
        cancel: &CancellationToken,
    ) -> CacheResult<CycleResult> {
        let Reconciled {
            watermark: previous_watermark,
            mut purged,
            remote_now,
        } = self.reconcile(session.as_ref()).await?;

        if mode == RefreshMode::Vacuum {
            let report = self.store.purge_all().await?;
            self.store.vacuum().await?;
            purged = Some(match purged {
                Some(mut earlier) => {
                    earlier.objects.extend(report.objects);
                    earlier.tables.extend(report.tables);
                    earlier.columns.extend(report.columns);
                    earlier.indexes.extend(report.indexes);
                    earlier.index_columns.extend(report.index_columns);
                    earlier.sources.extend(report.sources);
                    earlier
                }
                None => report,
            });
        }

        let listing_watermark = match mode {
            RefreshMode::Incremental => previous_watermark.map(|w| w.naive_utc()),
            RefreshMode::Full | RefreshMode::Vacuum => None,
        };

        self.set_phase(RefreshPhase::Syncing);
        let cycle_start = cycle_start(remote_now, &self.alias);
        let state = Arc::new(SyncState::new());
        state.start_producing();

        let kinds = self.options.filter.included_kinds();
        let queues: HashMap<ObjectKind, Arc<KindQueue>> = kinds
            .iter()
            .map(|kind| (*kind, Arc::new(KindQueue::new(*kind))))
            .collect();

        let handler: Arc<dyn BatchHandler> = Arc::new(DetailFetcher::new(
            session.clone(),
            self.store.clone(),
            self.options.clone(),
        ));
        let worker_config = WorkerConfig {
            batch_size: self.options.batch_size,
            poll_interval: self.options.poll_interval(),
            save_retries: self.options.save_retries,
        };

        let mut tasks = JoinSet::new();
        for kind in kinds {
            let worker = KindWorker::new(
                queues[kind].clone(),
                state.clone(),
                handler.clone(),
                worker_config,
                cancel.clone(),
            );
            let span = info_span!("worker", alias = %self.alias, kind = %kind);
            tasks.spawn(async move { TaskOutput::Worker(worker.run().await) }.instrument(span));
        }

        let lister = CatalogLister::new(
            session,
            self.options.filter.clone(),
            listing_watermark,
            queues,
            state.clone(),
            cancel.clone(),
        )
        .with_prefetch(self.options.prefetch_for(QueryShape::ListObjects));
        let span = info_span!("lister", alias = %self.alias);
        tasks.spawn(async move { TaskOutput::Listing(lister.run().await) }.instrument(span));

        let mut listing = None;
        let mut workers = Vec::with_capacity(kinds.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutput::Listing(result)) => {
                    if result.is_err() {
                        cancel.cancel();
                    }
                    listing = Some(result);
                }
                Ok(TaskOutput::Worker(report)) => workers.push(report),
                Err(e) => {
                    // A panicked lister never clears the producer flag itself.
                    state.stop_producing();
                    cancel.cancel();
                    error!(alias = %self.alias, error = %e, component = "coordinator", "Refresh task aborted");
                    listing.get_or_insert(Err(CacheError::internal(format!(
                        "Refresh task aborted: {e}"
                    ))));
                }
            }
        }
        workers.sort_by_key(|w| w.kind);

        let listing =
            listing.unwrap_or_else(|| Err(CacheError::internal("Lister did not report")))?;

        if let Some(lost) = workers.iter().find(|w| w.connection_failures > 0) {
            return Err(CacheError::not_connected(format!(
                "Remote connection lost while fetching {} details",
                lost.kind
            )));
        }

        Ok(CycleResult {
            listing,
            workers,
            cycle_start,
            previous_watermark,
            purged,
        })
    }
}

/// Start of the cycle on the remote clock, in the whole seconds `LAST_DDL_TIME` has.
fn cycle_start(remote_now: Option<NaiveDateTime>, alias: &str) -> DateTime<Utc> {
    let start = remote_now.map(|now| now.and_utc()).unwrap_or_else(|| {
        warn!(alias = %alias, component = "coordinator", "Remote clock unavailable, using local time");
        Utc::now()
    });
    start.trunc_subsecs(0)
}

fn outcome(workers: &[WorkerReport], stopped: bool) -> RefreshOutcome {
    if stopped {
        RefreshOutcome::Stopped
    } else if workers.iter().any(|w| w.save_failures > 0) {
        RefreshOutcome::Degraded
    } else {
        RefreshOutcome::Completed
    }
}
