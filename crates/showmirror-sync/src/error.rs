use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use showmirror_core::RefreshError;
use showmirror_db::DbError;
use thiserror::Error;

use crate::retry::{RetryError, Retryable};

/// A single failed call against a [`crate::CatalogSource`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts, dropped connections, 5xx and rate limiting.
    #[error("{message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{message}")]
    NotFound { message: String },

    /// A response that could not be decoded into catalog types.
    #[error("{message}")]
    Malformed { message: String },

    #[error("{message}")]
    Permanent { message: String },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A failed write or read against a [`crate::MirrorStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{0}")]
    Other(String),
}

/// Stable label for a failed show, persisted with the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RetryExhausted,
    NotFound,
    PermanentFetch,
    Validation,
    StoreWrite,
    Internal,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RetryExhausted => "retry_exhausted",
            FailureKind::NotFound => "not_found",
            FailureKind::PermanentFetch => "permanent_fetch",
            FailureKind::Validation => "validation",
            FailureKind::StoreWrite => "store_write",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why one show could not be refreshed. Never aborts the run.
#[derive(Debug, Error)]
pub enum ShowError {
    #[error("fetching {what} for show {show_id}: {source}")]
    Fetch {
        show_id: i64,
        what: &'static str,
        #[source]
        source: RetryError<FetchError>,
    },

    #[error(transparent)]
    Validation(#[from] RefreshError),

    #[error("writing show {show_id}: {source}")]
    Store {
        show_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("task for show {show_id} panicked")]
    Panicked { show_id: i64 },
}

impl ShowError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ShowError::Fetch { source, .. } => match source {
                RetryError::Exhausted { .. } => FailureKind::RetryExhausted,
                RetryError::Fatal(FetchError::NotFound { .. }) => FailureKind::NotFound,
                RetryError::Fatal(FetchError::Malformed { .. }) => FailureKind::Validation,
                RetryError::Fatal(_) => FailureKind::PermanentFetch,
            },
            ShowError::Validation(_) => FailureKind::Validation,
            ShowError::Store { .. } => FailureKind::StoreWrite,
            ShowError::Panicked { .. } => FailureKind::Internal,
        }
    }
}

/// A walk-level failure. Ends the run without advancing the watermark.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("index page {page} failed: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: RetryError<FetchError>,
    },

    #[error("index walk passed the {max_pages}-page limit")]
    PageLimit { max_pages: u32 },

    #[error("index walk already failed: {reason}")]
    WalkFailed { reason: String },

    #[error("no watermark recorded yet; run a full ingest first")]
    NoWatermark,

    #[error("change feed since {since} failed: {source}")]
    ChangeFeed {
        since: DateTime<Utc>,
        #[source]
        source: RetryError<FetchError>,
    },

    #[error("watermark storage failed: {0}")]
    Watermark(#[source] StoreError),
}

/// Why a run could not be recorded in the ingest-run ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("another ingest run holds the run lock")]
    RunLockHeld,

    #[error(transparent)]
    Db(#[from] DbError),
}
