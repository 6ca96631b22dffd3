//! Persists each run's lifecycle and failures in the `ingest_runs` ledger.
//!
//! A run holds the database-wide run lock from the moment its row is queued
//! until its outcome is stored, so only one run mirrors at a time across
//! every CLI and server process sharing the database.

use chrono::Utc;
use showmirror_core::{RunMode, TriggerSource};
use showmirror_db::{
    abandon_unfinished_ingest_runs, create_ingest_run, fail_ingest_run, finish_ingest_run,
    insert_ingest_run_failures, start_ingest_run, try_acquire_run_lock, DbError, IngestRunRow,
    IngestRunStatus, IngestRunSummary, NewIngestRunFailure, RunLock,
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::error::LedgerError;
use crate::orchestrator::Orchestrator;
use crate::record::{RunRecord, RunStatus};

/// Outcome of a run that was recorded in the ledger.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub run: IngestRunRow,
    pub record: RunRecord,
}

/// A run that owns the run lock and has a `queued` ledger row, but has not
/// started walking yet.
#[derive(Debug)]
pub struct QueuedRun {
    pub run: IngestRunRow,
    mode: RunMode,
    lock: RunLock,
}

/// Takes the run lock and records a `queued` run.
///
/// # Errors
///
/// Returns [`LedgerError::RunLockHeld`] if another run is in progress
/// anywhere, or [`LedgerError::Db`] if the row cannot be created.
pub async fn queue_run(
    pool: &PgPool,
    mode: RunMode,
    trigger: TriggerSource,
) -> Result<QueuedRun, LedgerError> {
    let Some(lock) = try_acquire_run_lock(pool).await? else {
        return Err(LedgerError::RunLockHeld);
    };
    match create_ingest_run(pool, mode.as_str(), trigger.as_str()).await {
        Ok(run) => {
            tracing::info!(run_id = run.id, public_id = %run.public_id, %mode, %trigger, "ingest run queued");
            Ok(QueuedRun { run, mode, lock })
        }
        Err(err) => {
            release_best_effort(lock).await;
            Err(err.into())
        }
    }
}

/// Runs a queued run to completion, stores its outcome, and releases the
/// run lock.
///
/// # Errors
///
/// Returns [`DbError`] if the run cannot be started or its summary cannot
/// be written. A failure to write the summary is reported after a
/// best-effort attempt to mark the run failed.
pub async fn execute_queued(
    pool: &PgPool,
    orchestrator: &Orchestrator,
    queued: QueuedRun,
    cancel: CancellationToken,
) -> Result<RecordedRun, DbError> {
    let QueuedRun { run, mode, lock } = queued;
    let outcome = record_run(pool, orchestrator, run, mode, cancel).await;
    release_best_effort(lock).await;
    outcome
}

/// Queues a run and executes it in place.
///
/// # Errors
///
/// See [`queue_run`] and [`execute_queued`].
pub async fn run_and_record(
    pool: &PgPool,
    orchestrator: &Orchestrator,
    mode: RunMode,
    trigger: TriggerSource,
    cancel: CancellationToken,
) -> Result<RecordedRun, LedgerError> {
    let queued = queue_run(pool, mode, trigger).await?;
    Ok(execute_queued(pool, orchestrator, queued, cancel).await?)
}

/// Fails ledger rows left `queued` or `running` by a process that died
/// mid-run.
///
/// Returns `None` without touching anything while a live run holds the run
/// lock, since its row is not stale.
///
/// # Errors
///
/// Returns [`DbError`] if the lock query or the update fails.
pub async fn abandon_stale_runs(pool: &PgPool) -> Result<Option<u64>, DbError> {
    let Some(lock) = try_acquire_run_lock(pool).await? else {
        return Ok(None);
    };
    let abandoned = abandon_unfinished_ingest_runs(pool).await;
    release_best_effort(lock).await;
    abandoned.map(Some)
}

async fn record_run(
    pool: &PgPool,
    orchestrator: &Orchestrator,
    run: IngestRunRow,
    mode: RunMode,
    cancel: CancellationToken,
) -> Result<RecordedRun, DbError> {
    if let Err(err) = start_ingest_run(pool, run.id, Utc::now()).await {
        fail_run_best_effort(pool, run.id, &err.to_string()).await;
        return Err(err);
    }

    let record = orchestrator.run(mode, cancel).await;

    if let Err(err) = persist_outcome(pool, run.id, &record).await {
        fail_run_best_effort(pool, run.id, &format!("could not store run outcome: {err}")).await;
        return Err(err);
    }

    let run = showmirror_db::get_ingest_run(pool, run.id).await?;
    Ok(RecordedRun { run, record })
}

async fn release_best_effort(lock: RunLock) {
    if let Err(err) = lock.release().await {
        tracing::warn!(error = %err, "failed to release run lock");
    }
}

async fn persist_outcome(pool: &PgPool, run_id: i64, record: &RunRecord) -> Result<(), DbError> {
    let failures: Vec<NewIngestRunFailure> = record
        .failures
        .iter()
        .map(|f| NewIngestRunFailure {
            show_id: f.show_id,
            failure_kind: f.kind.as_str().to_string(),
            message: f.message.clone(),
        })
        .collect();
    insert_ingest_run_failures(pool, run_id, &failures).await?;
    finish_ingest_run(pool, run_id, &summarize(record)).await
}

/// Ledger counters and terminal status for a finished run.
#[must_use]
pub fn summarize(record: &RunRecord) -> IngestRunSummary {
    let (status, error_message) = match &record.status {
        RunStatus::Succeeded => (IngestRunStatus::Succeeded, None),
        RunStatus::CompletedWithFailures => (
            IngestRunStatus::Partial,
            Some(format!("{} show(s) failed", record.shows_failed())),
        ),
        RunStatus::Aborted { reason } => (IngestRunStatus::Failed, Some(reason.clone())),
        RunStatus::Cancelled => (IngestRunStatus::Cancelled, None),
    };
    IngestRunSummary {
        status,
        shows_attempted: to_i32(record.shows_attempted),
        shows_succeeded: to_i32(record.shows_succeeded),
        shows_failed: to_i32(record.shows_failed()),
        watermark_advanced: record.watermark_advanced(),
        error_message,
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

async fn fail_run_best_effort(pool: &PgPool, run_id: i64, message: &str) {
    if let Err(err) = fail_ingest_run(pool, run_id, message).await {
        tracing::error!(run_id, error = %err, "failed to mark ingest run as failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::record::ShowFailure;

    fn record_with(status: RunStatus) -> RunRecord {
        let mut record = RunRecord::new(RunMode::Incremental, Utc::now());
        record.status = status;
        record
    }

    #[test]
    fn failures_make_a_partial_run() {
        let mut record = record_with(RunStatus::CompletedWithFailures);
        record.shows_attempted = 3;
        record.shows_succeeded = 2;
        record.failures.push(ShowFailure {
            show_id: 123,
            kind: FailureKind::RetryExhausted,
            message: "503".to_string(),
        });
        record.watermark = Some(record.started_at);

        let summary = summarize(&record);
        assert_eq!(summary.status, IngestRunStatus::Partial);
        assert_eq!(summary.shows_attempted, 3);
        assert_eq!(summary.shows_failed, 1);
        assert!(summary.watermark_advanced);
        assert_eq!(summary.error_message.as_deref(), Some("1 show(s) failed"));
    }

    #[test]
    fn aborted_run_keeps_its_reason() {
        let summary = summarize(&record_with(RunStatus::Aborted {
            reason: "index page 2 failed".to_string(),
        }));
        assert_eq!(summary.status, IngestRunStatus::Failed);
        assert_eq!(summary.error_message.as_deref(), Some("index page 2 failed"));
        assert!(!summary.watermark_advanced);
    }

    #[test]
    fn cancelled_and_clean_runs_have_no_message() {
        let cancelled = summarize(&record_with(RunStatus::Cancelled));
        let clean = summarize(&record_with(RunStatus::Succeeded));
        assert_eq!(cancelled.status, IngestRunStatus::Cancelled);
        assert_eq!(clean.status, IngestRunStatus::Succeeded);
        assert!(cancelled.error_message.is_none() && clean.error_message.is_none());
    }
}
