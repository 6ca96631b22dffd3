//! Owns the single ingest run a server process may have in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use showmirror_core::{RunMode, TriggerSource};
use showmirror_sync::{execute_queued, queue_run, LedgerError, Orchestrator};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A run whose ledger row exists, plus the work that carries it out.
pub struct Launched {
    pub run_id: Uuid,
    pub work: BoxFuture<'static, ()>,
}

/// Prepares one run. The returned `work` resolves once the run has been
/// recorded.
pub type LaunchRun = Arc<
    dyn Fn(RunMode, TriggerSource, CancellationToken) -> BoxFuture<'static, Result<Launched, StartError>>
        + Send
        + Sync,
>;

/// What the API reports about the run in flight.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveRun {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub trigger_source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub cancel_requested: bool,
}

/// Why a run could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// This process already has a run in flight.
    Busy(ActiveRun),
    /// Another process sharing the database holds the run lock.
    LockedElsewhere,
    /// The run could not be queued in the ledger.
    Ledger(String),
}

struct Slot {
    info: ActiveRun,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct RunController {
    launch: LaunchRun,
    slot: Arc<Mutex<Option<Slot>>>,
}

impl RunController {
    pub fn new(launch: LaunchRun) -> Self {
        Self {
            launch,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts a run unless one is already active here or elsewhere.
    ///
    /// The run's ledger row exists by the time this returns `Ok`.
    pub async fn try_start(
        &self,
        mode: RunMode,
        trigger_source: TriggerSource,
    ) -> Result<ActiveRun, StartError> {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.as_ref() {
            if !current.handle.is_finished() {
                return Err(StartError::Busy(current.info.clone()));
            }
        }

        let cancel = CancellationToken::new();
        let launched = (self.launch)(mode, trigger_source, cancel.clone()).await?;
        let info = ActiveRun {
            run_id: launched.run_id,
            mode,
            trigger_source,
            started_at: Utc::now(),
            cancel_requested: false,
        };
        let handle = tokio::spawn(launched.work);
        tracing::info!(run_id = %info.run_id, %mode, trigger = %trigger_source, "ingest run started");

        *slot = Some(Slot {
            info: info.clone(),
            cancel,
            handle,
        });
        Ok(info)
    }

    /// The run in flight, if any.
    pub async fn active(&self) -> Option<ActiveRun> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.info.clone())
    }

    /// Asks the active run to stop. Returns the run, or `None` if idle.
    pub async fn cancel(&self) -> Option<ActiveRun> {
        let mut slot = self.slot.lock().await;
        let current = slot.as_mut().filter(|s| !s.handle.is_finished())?;
        current.cancel.cancel();
        current.info.cancel_requested = true;
        tracing::info!(run_id = %current.info.run_id, mode = %current.info.mode, "ingest run cancellation requested");
        Some(current.info.clone())
    }

    /// Cancels the active run and waits for it to record its outcome.
    pub async fn shutdown(&self) {
        let slot = self.slot.lock().await.take();
        if let Some(slot) = slot {
            slot.cancel.cancel();
            if let Err(err) = slot.handle.await {
                tracing::error!(error = %err, "ingest run task failed during shutdown");
            }
        }
    }
}

/// Launches runs through the ledger so every trigger leaves an
/// `ingest_runs` row behind and holds the database-wide run lock.
pub fn recorded_launcher(pool: PgPool, orchestrator: Orchestrator) -> LaunchRun {
    Arc::new(
        move |mode: RunMode, trigger: TriggerSource, cancel: CancellationToken| {
            let pool = pool.clone();
            let orchestrator = orchestrator.clone();
            async move {
                let queued = match queue_run(&pool, mode, trigger).await {
                    Ok(queued) => queued,
                    Err(LedgerError::RunLockHeld) => return Err(StartError::LockedElsewhere),
                    Err(LedgerError::Db(err)) => {
                        tracing::error!(%mode, %trigger, error = %err, "ingest run could not be queued");
                        return Err(StartError::Ledger(err.to_string()));
                    }
                };
                let run_id = queued.run.public_id;
                let work = async move {
                    if let Err(err) = execute_queued(&pool, &orchestrator, queued, cancel).await {
                        tracing::error!(%run_id, %mode, %trigger, error = %err, "ingest run could not be recorded");
                    }
                }
                .boxed();
                Ok(Launched { run_id, work })
            }
            .boxed()
        },
    )
}
