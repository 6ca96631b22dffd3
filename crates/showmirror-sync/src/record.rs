//! The summary every run hands back to its caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use showmirror_core::RunMode;

use crate::error::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// The walk finished but at least one show failed.
    CompletedWithFailures,
    /// A walk-level error stopped the run early.
    Aborted { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowFailure {
    pub show_id: i64,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub pages_walked: u32,
    pub shows_attempted: usize,
    pub shows_succeeded: usize,
    /// Stubs skipped because the show was already dispatched in this run.
    pub duplicates_skipped: usize,
    /// Shows whose refresh wrote nothing new.
    pub shows_unchanged: usize,
    pub failures: Vec<ShowFailure>,
    /// The watermark stored at the end of the run, if it was advanced.
    pub watermark: Option<DateTime<Utc>>,
}

impl RunRecord {
    #[must_use]
    pub fn new(mode: RunMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            finished_at: None,
            status: RunStatus::Succeeded,
            pages_walked: 0,
            shows_attempted: 0,
            shows_succeeded: 0,
            duplicates_skipped: 0,
            shows_unchanged: 0,
            failures: Vec::new(),
            watermark: None,
        }
    }

    #[must_use]
    pub fn shows_failed(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn watermark_advanced(&self) -> bool {
        self.watermark.is_some()
    }

    /// IDs of the failed shows, ascending.
    #[must_use]
    pub fn failed_show_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.failures.iter().map(|f| f.show_id).collect();
        ids.sort_unstable();
        ids
    }
}
