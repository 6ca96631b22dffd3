//! Drives one ingest run: walk the catalog, fan shows out to a bounded pool
//! of tasks, then settle the watermark.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use showmirror_core::{AppConfig, RefreshStats, RunMode, ShowStub};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{FailureKind, RunError, ShowError};
use crate::ports::{CatalogSource, MirrorStore};
use crate::processor::process_show;
use crate::record::{RunRecord, RunStatus, ShowFailure};
use crate::retry::RetryPolicy;
use crate::walker::{changed_since_watermark, PageWalker, MAX_PAGES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    pub max_concurrent_shows: usize,
    pub max_pages: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrent_shows: 10,
            max_pages: MAX_PAGES,
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy::from_app_config(config),
            max_concurrent_shows: config.max_concurrent_shows.max(1),
            max_pages: MAX_PAGES,
        }
    }
}

/// How the walk half of a run ended.
enum WalkOutcome {
    Completed,
    Cancelled,
    Failed(RunError),
}

#[derive(Clone)]
pub struct Orchestrator {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn MirrorStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn MirrorStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs a full or incremental ingest to completion and reports what
    /// happened. Never returns an error: walk-level failures end up in
    /// [`RunRecord::status`].
    ///
    /// A full run advances the watermark to its start time only when the
    /// walk finished with no failed shows. An incremental run advances it
    /// whenever the change batch was fully processed, failures included.
    /// Cancelled or aborted runs never move it.
    pub async fn run(&self, mode: RunMode, cancel: CancellationToken) -> RunRecord {
        let started_at = Utc::now();
        let mut record = RunRecord::new(mode, started_at);
        tracing::info!(%mode, max_concurrent_shows = self.settings.max_concurrent_shows, "ingest run starting");

        let mut pool = ShowPool::new(self);
        let walk = match mode {
            RunMode::Full => self.walk_index(&mut pool, &mut record, &cancel).await,
            RunMode::Incremental => self.walk_changes(&mut pool, &mut record, &cancel).await,
        };
        pool.drain(&mut record).await;

        let advance = match (&walk, mode) {
            (WalkOutcome::Completed, RunMode::Full) => record.failures.is_empty(),
            (WalkOutcome::Completed, RunMode::Incremental) => true,
            (WalkOutcome::Cancelled | WalkOutcome::Failed(_), _) => false,
        };
        record.status = match walk {
            WalkOutcome::Completed if record.failures.is_empty() => RunStatus::Succeeded,
            WalkOutcome::Completed => RunStatus::CompletedWithFailures,
            WalkOutcome::Cancelled => RunStatus::Cancelled,
            WalkOutcome::Failed(err) => {
                tracing::error!(%mode, error = %err, "ingest run aborted");
                RunStatus::Aborted {
                    reason: err.to_string(),
                }
            }
        };

        if advance {
            match self.store.set_watermark(started_at).await {
                Ok(stored) => record.watermark = Some(stored),
                Err(err) => {
                    let err = RunError::Watermark(err);
                    tracing::error!(%mode, error = %err, "could not advance watermark");
                    record.status = RunStatus::Aborted {
                        reason: err.to_string(),
                    };
                }
            }
        }

        record.finished_at = Some(Utc::now());
        tracing::info!(
            %mode,
            status = ?record.status,
            pages = record.pages_walked,
            attempted = record.shows_attempted,
            succeeded = record.shows_succeeded,
            unchanged = record.shows_unchanged,
            failed = record.shows_failed(),
            duplicates = record.duplicates_skipped,
            watermark_advanced = record.watermark_advanced(),
            "ingest run finished"
        );
        record
    }

    async fn walk_index(
        &self,
        pool: &mut ShowPool,
        record: &mut RunRecord,
        cancel: &CancellationToken,
    ) -> WalkOutcome {
        let mut walker = PageWalker::new(self.settings.max_pages);
        loop {
            if cancel.is_cancelled() {
                return WalkOutcome::Cancelled;
            }
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return WalkOutcome::Cancelled,
                next = walker.next_page(self.catalog.as_ref(), &self.settings.retry) => next,
            };
            match next {
                Ok(Some(page)) => {
                    record.pages_walked += 1;
                    tracing::info!(page = page.page, shows = page.stubs.len(), "dispatching index page");
                    if !pool.dispatch(page.stubs, record, cancel).await {
                        return WalkOutcome::Cancelled;
                    }
                }
                Ok(None) => return WalkOutcome::Completed,
                Err(err) => return WalkOutcome::Failed(err),
            }
        }
    }

    async fn walk_changes(
        &self,
        pool: &mut ShowPool,
        record: &mut RunRecord,
        cancel: &CancellationToken,
    ) -> WalkOutcome {
        let batch = tokio::select! {
            biased;
            () = cancel.cancelled() => return WalkOutcome::Cancelled,
            batch = changed_since_watermark(
                self.catalog.as_ref(),
                self.store.as_ref(),
                &self.settings.retry,
            ) => batch,
        };
        match batch {
            Ok(batch) => {
                if pool.dispatch(batch.stubs, record, cancel).await {
                    WalkOutcome::Completed
                } else {
                    WalkOutcome::Cancelled
                }
            }
            Err(err) => WalkOutcome::Failed(err),
        }
    }
}

type ShowOutcome = (i64, Result<RefreshStats, ShowError>);

/// Bounded set of in-flight show refreshes. The join set doubles as the
/// result queue the run record is built from.
struct ShowPool {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn MirrorStore>,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
    tasks: JoinSet<ShowOutcome>,
    dispatched: HashSet<i64>,
    in_flight: HashSet<i64>,
}

impl ShowPool {
    fn new(orchestrator: &Orchestrator) -> Self {
        Self {
            catalog: Arc::clone(&orchestrator.catalog),
            store: Arc::clone(&orchestrator.store),
            retry: orchestrator.settings.retry,
            permits: Arc::new(Semaphore::new(orchestrator.settings.max_concurrent_shows.max(1))),
            tasks: JoinSet::new(),
            dispatched: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Spawns one task per new show in `stubs`, waiting for a free slot
    /// before each. Returns `false` if cancellation stopped the dispatch.
    async fn dispatch(
        &mut self,
        stubs: Vec<ShowStub>,
        record: &mut RunRecord,
        cancel: &CancellationToken,
    ) -> bool {
        for stub in stubs {
            if !self.dispatched.insert(stub.id) {
                record.duplicates_skipped += 1;
                continue;
            }
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                permit = Arc::clone(&self.permits).acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                return false;
            };

            record.shows_attempted += 1;
            self.in_flight.insert(stub.id);
            let catalog = Arc::clone(&self.catalog);
            let store = Arc::clone(&self.store);
            let retry = self.retry;
            self.tasks.spawn(async move {
                let _permit = permit;
                let show_id = stub.id;
                let outcome = AssertUnwindSafe(process_show(
                    catalog.as_ref(),
                    store.as_ref(),
                    &retry,
                    &stub,
                ))
                .catch_unwind()
                .await
                .unwrap_or(Err(ShowError::Panicked { show_id }));
                (show_id, outcome)
            });

            while let Some(joined) = self.tasks.try_join_next() {
                self.settle(joined, record);
            }
        }
        true
    }

    /// Waits for every in-flight show to report.
    async fn drain(&mut self, record: &mut RunRecord) {
        while let Some(joined) = self.tasks.join_next().await {
            self.settle(joined, record);
        }
        for show_id in self.in_flight.drain() {
            record.failures.push(ShowFailure {
                show_id,
                kind: FailureKind::Internal,
                message: "show task ended without reporting".to_string(),
            });
        }
    }

    fn settle(&mut self, joined: Result<ShowOutcome, JoinError>, record: &mut RunRecord) {
        let (show_id, outcome) = match joined {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "show task failed to join");
                return;
            }
        };
        self.in_flight.remove(&show_id);
        match outcome {
            Ok(stats) => {
                record.shows_succeeded += 1;
                if stats.is_noop() {
                    record.shows_unchanged += 1;
                }
            }
            Err(err) => {
                let kind = err.kind();
                tracing::warn!(show_id, %kind, error = %err, "show refresh failed");
                record.failures.push(ShowFailure {
                    show_id,
                    kind,
                    message: err.to_string(),
                });
            }
        }
    }
}
