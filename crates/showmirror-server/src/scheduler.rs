//! Background job scheduler.
//!
//! Registers the recurring incremental update at server startup.

use showmirror_core::{RunMode, TriggerSource};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runner::{RunController, StartError};

/// Builds and starts the scheduler with the update job on `schedule`
/// (six-field cron, seconds first, UTC).
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `schedule` does not parse, or the scheduler fails to start.
pub async fn build_scheduler(
    runs: RunController,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_update_job(&scheduler, runs, schedule).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_update_job(
    scheduler: &JobScheduler,
    runs: RunController,
    schedule: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let runs = runs.clone();
        Box::pin(async move {
            match runs.try_start(RunMode::Incremental, TriggerSource::Schedule).await {
                Ok(run) => tracing::info!(run_id = %run.run_id, "scheduler: incremental update started"),
                Err(StartError::Busy(active)) => tracing::info!(
                    mode = %active.mode,
                    started_at = %active.started_at,
                    "scheduler: a run is already active; skipping this update"
                ),
                Err(StartError::LockedElsewhere) => tracing::info!(
                    "scheduler: another process is running an ingest; skipping this update"
                ),
                Err(StartError::Ledger(err)) => tracing::error!(
                    error = %err,
                    "scheduler: incremental update could not be queued"
                ),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule, "scheduler: incremental update registered");
    Ok(())
}
