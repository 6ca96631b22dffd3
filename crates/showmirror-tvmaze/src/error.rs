use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited on {url} (retry after {retry_after_secs:?}s)")]
    RateLimited {
        url: String,
        retry_after_secs: Option<u64>,
    },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid catalog base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl CatalogError {
    /// Returns `true` for conditions that may clear up on their own: rate
    /// limiting, 5xx responses, and network-level failures (timeouts,
    /// refused or reset connections).
    ///
    /// A 404, any other 4xx, or an undecodable body is permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::RateLimited { .. } => true,
            CatalogError::UnexpectedStatus { status, .. } => *status >= 500,
            CatalogError::Http(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            CatalogError::Deserialize { .. }
            | CatalogError::NotFound { .. }
            | CatalogError::InvalidBaseUrl { .. } => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }
}
