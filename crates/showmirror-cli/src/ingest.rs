//! `ingest` and `update`: run the orchestrator and record the result.

use std::sync::Arc;

use showmirror_core::{AppConfig, RunMode, TriggerSource};
use showmirror_sync::{
    run_and_record, CatalogSource, MirrorStore, Orchestrator, OrchestratorSettings,
    PgMirrorStore, RunRecord, RunStatus,
};
use showmirror_tvmaze::TvMazeClient;
use tokio_util::sync::CancellationToken;

/// Run a full or incremental ingest from the command line.
///
/// Ctrl-C cancels the run: shows already in flight finish, nothing new is
/// started, and the watermark is left where it was.
///
/// # Errors
///
/// Returns an error if the TVMaze client cannot be built, the run ledger
/// cannot be written, or the run aborted.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    mode: RunMode,
) -> anyhow::Result<()> {
    let catalog: Arc<dyn CatalogSource> = Arc::new(TvMazeClient::from_config(config)?);
    let store: Arc<dyn MirrorStore> = Arc::new(PgMirrorStore::new(pool.clone()));
    let orchestrator =
        Orchestrator::new(catalog, store, OrchestratorSettings::from_app_config(config));

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = run_and_record(pool, &orchestrator, mode, TriggerSource::Cli, cancel).await;
    watcher.abort();
    let recorded = result?;

    print_summary(&recorded.record);
    println!("run {} recorded as {}", recorded.run.public_id, recorded.run.status);

    if let RunStatus::Aborted { reason } = &recorded.record.status {
        anyhow::bail!("{mode} run aborted: {reason}");
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("ctrl-c received, letting in-flight shows finish");
        cancel.cancel();
    }
}

fn print_summary(record: &RunRecord) {
    let status = match &record.status {
        RunStatus::Succeeded => "succeeded".to_string(),
        RunStatus::CompletedWithFailures => "completed with failures".to_string(),
        RunStatus::Aborted { reason } => format!("aborted ({reason})"),
        RunStatus::Cancelled => "cancelled".to_string(),
    };
    println!("{} run {status}", record.mode);
    println!(
        "  pages: {}  shows: {} attempted, {} succeeded ({} unchanged), {} failed",
        record.pages_walked,
        record.shows_attempted,
        record.shows_succeeded,
        record.shows_unchanged,
        record.shows_failed()
    );
    match record.watermark {
        Some(at) => println!("  watermark: {}", at.to_rfc3339()),
        None => println!("  watermark: not advanced"),
    }
    for failure in &record.failures {
        println!(
            "  failed show {:<8} {:<16} {}",
            failure.show_id,
            failure.kind.as_str(),
            failure.message
        );
    }
}
