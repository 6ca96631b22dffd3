//! Database operations for `ingest_runs` and `ingest_run_failures`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `ingest_runs` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IngestRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub mode: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub shows_attempted: i32,
    pub shows_succeeded: i32,
    pub shows_failed: i32,
    pub watermark_advanced: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `ingest_run_failures` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IngestRunFailureRow {
    pub id: i64,
    pub ingest_run_id: i64,
    pub show_id: i64,
    pub failure_kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Terminal status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestRunStatus {
    Succeeded,
    /// Finished, but at least one show failed.
    Partial,
    Failed,
    Cancelled,
}

impl IngestRunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IngestRunStatus::Succeeded => "succeeded",
            IngestRunStatus::Partial => "partial",
            IngestRunStatus::Failed => "failed",
            IngestRunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IngestRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestRunStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(IngestRunStatus::Succeeded),
            "partial" => Ok(IngestRunStatus::Partial),
            "failed" => Ok(IngestRunStatus::Failed),
            "cancelled" => Ok(IngestRunStatus::Cancelled),
            other => Err(DbError::InvalidIngestRunStatus(other.to_string())),
        }
    }
}

/// Counters written when a run finishes.
#[derive(Debug, Clone)]
pub struct IngestRunSummary {
    pub status: IngestRunStatus,
    pub shows_attempted: i32,
    pub shows_succeeded: i32,
    pub shows_failed: i32,
    pub watermark_advanced: bool,
    pub error_message: Option<String>,
}

/// One failed show to record against a run.
#[derive(Debug, Clone)]
pub struct NewIngestRunFailure {
    pub show_id: i64,
    pub failure_kind: String,
    pub message: String,
}

const RUN_COLUMNS: &str = "id, public_id, mode, trigger_source, status, started_at, \
                           completed_at, shows_attempted, shows_succeeded, shows_failed, \
                           watermark_advanced, error_message, created_at";

// ---------------------------------------------------------------------------
// ingest_runs operations
// ---------------------------------------------------------------------------

/// Creates a new ingest run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingest_run(
    pool: &PgPool,
    mode: &str,
    trigger_source: &str,
) -> Result<IngestRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, IngestRunRow>(&format!(
        "INSERT INTO ingest_runs (public_id, mode, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(mode)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_ingest_run(
    pool: &PgPool,
    id: i64,
    started_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'running', started_at = $1 \
         WHERE id = $2 AND status = 'queued'",
    )
    .bind(started_at)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Moves a `running` run to its terminal status and records its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn finish_ingest_run(
    pool: &PgPool,
    id: i64,
    summary: &IngestRunSummary,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = $1, completed_at = NOW(), \
             shows_attempted = $2, shows_succeeded = $3, shows_failed = $4, \
             watermark_advanced = $5, error_message = $6 \
         WHERE id = $7 AND status = 'running'",
    )
    .bind(summary.status.as_str())
    .bind(summary.shows_attempted)
    .bind(summary.shows_succeeded)
    .bind(summary.shows_failed)
    .bind(summary.watermark_advanced)
    .bind(&summary.error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `queued` or `running` run as `failed` with `error_message`.
///
/// Used when the run could not produce a summary at all.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run already
/// finished, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingest_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('queued', 'running')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fails every run left `queued` or `running` by a process that exited
/// mid-run. Returns the number of runs touched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn abandon_unfinished_ingest_runs(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'failed', completed_at = NOW(), \
             error_message = 'interrupted: process exited before the run finished' \
         WHERE status IN ('queued', 'running')",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_ingest_run(pool: &PgPool, id: i64) -> Result<IngestRunRow, DbError> {
    sqlx::query_as::<_, IngestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingest_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches a single run by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_ingest_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<IngestRunRow, DbError> {
    sqlx::query_as::<_, IngestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingest_runs WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingest_runs(pool: &PgPool, limit: i64) -> Result<Vec<IngestRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingest_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// ingest_run_failures operations
// ---------------------------------------------------------------------------

/// Records failed shows for a run in one transaction.
///
/// A show already recorded for the run has its kind and message replaced.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn insert_ingest_run_failures(
    pool: &PgPool,
    run_id: i64,
    failures: &[NewIngestRunFailure],
) -> Result<(), DbError> {
    if failures.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for failure in failures {
        sqlx::query(
            "INSERT INTO ingest_run_failures (ingest_run_id, show_id, failure_kind, message) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (ingest_run_id, show_id) DO UPDATE SET \
                 failure_kind = EXCLUDED.failure_kind, \
                 message      = EXCLUDED.message",
        )
        .bind(run_id)
        .bind(failure.show_id)
        .bind(&failure.failure_kind)
        .bind(&failure.message)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Failed shows for a run, by show ID.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingest_run_failures(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<IngestRunFailureRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestRunFailureRow>(
        "SELECT id, ingest_run_id, show_id, failure_kind, message, created_at \
         FROM ingest_run_failures \
         WHERE ingest_run_id = $1 \
         ORDER BY show_id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
