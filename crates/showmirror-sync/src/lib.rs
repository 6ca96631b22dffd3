//! Orchestration for mirroring the TVMaze catalog: retries, index and change
//! walks, per-show refreshes, and run bookkeeping.

pub mod adapters;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod ports;
pub mod processor;
pub mod record;
pub mod retry;
pub mod walker;

pub use adapters::PgMirrorStore;
pub use error::{FailureKind, FetchError, LedgerError, RunError, ShowError, StoreError};
pub use ledger::{
    abandon_stale_runs, execute_queued, queue_run, run_and_record, summarize, QueuedRun,
    RecordedRun,
};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use ports::{CatalogSource, MirrorStore};
pub use processor::{expand, process_show};
pub use record::{RunRecord, RunStatus, ShowFailure};
pub use retry::{RetryError, RetryPolicy, Retryable};
pub use walker::{changed_since_watermark, ChangeBatch, IndexPage, PageWalker, WalkState, MAX_PAGES};
