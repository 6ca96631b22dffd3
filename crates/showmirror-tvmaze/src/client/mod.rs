//! HTTP client for the public TVMaze API.

mod pacing;
mod updates;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use showmirror_core::{AppConfig, Episode, Season, ShowDetail, ShowStub};

use crate::error::CatalogError;
use crate::normalize::{
    epoch_to_utc, normalize_episode, normalize_season, normalize_show, normalize_stub,
};
use crate::types::{IndexEntry, TvMazeEpisode, TvMazeSeason, TvMazeShow};
use pacing::RequestPacer;

pub use updates::UpdateWindow;

/// Default wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// HTTP client for the TVMaze catalog.
///
/// Every method performs exactly one request and maps the response onto a
/// typed [`CatalogError`]. Retrying is the caller's job; use
/// [`CatalogError::is_transient`] to decide.
///
/// Clones share one request pacer, see [`TvMazeClient::with_request_gap`].
#[derive(Debug, Clone)]
pub struct TvMazeClient {
    client: Client,
    base_url: String,
    pacer: Arc<RequestPacer>,
}

impl TvMazeClient {
    /// Creates a client rooted at `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidBaseUrl`] if `base_url` is not an absolute URL.
    /// - [`CatalogError::Http`] if the underlying `reqwest::Client` cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, CatalogError> {
        let trimmed = base_url.trim_end_matches('/');
        reqwest::Url::parse(trimmed).map_err(|e| CatalogError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: trimmed.to_owned(),
            pacer: Arc::new(RequestPacer::new(Duration::ZERO)),
        })
    }

    /// Spaces request starts at least `gap` apart across this client and all
    /// of its clones. A zero gap disables pacing.
    #[must_use]
    pub fn with_request_gap(mut self, gap: Duration) -> Self {
        self.pacer = Arc::new(RequestPacer::new(gap));
        self
    }

    #[must_use]
    pub fn request_gap(&self) -> Duration {
        self.pacer.gap()
    }

    /// # Errors
    ///
    /// See [`TvMazeClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, CatalogError> {
        Ok(Self::new(
            &config.catalog_base_url,
            config.catalog_request_timeout_secs,
            &config.catalog_user_agent,
        )?
        .with_request_gap(Duration::from_millis(config.catalog_request_delay_ms)))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one page of the show index (`GET /shows?page=N`).
    ///
    /// TVMaze answers 404 past the last page; that is reported as an empty
    /// page so the walker can treat both the same way.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`] other than `NotFound`.
    pub async fn fetch_index_page(&self, page: u32) -> Result<Vec<ShowStub>, CatalogError> {
        let url = format!("{}/shows?page={page}", self.base_url);
        match self
            .get_json::<Vec<IndexEntry>>(&url, &format!("index page {page}"))
            .await
        {
            Ok(entries) => Ok(entries.iter().map(normalize_stub).collect()),
            Err(CatalogError::NotFound { .. }) => {
                tracing::debug!(page, "index page not found, treating as end of index");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches the change feed (`GET /updates/shows[?since=...]`), sorted by show ID.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`]; a key that is not a numeric show ID is reported
    /// as `Deserialize`.
    pub async fn fetch_updates(
        &self,
        window: Option<UpdateWindow>,
    ) -> Result<Vec<ShowStub>, CatalogError> {
        let url = match window {
            Some(window) => format!("{}/updates/shows?since={}", self.base_url, window.as_str()),
            None => format!("{}/updates/shows", self.base_url),
        };
        let raw: std::collections::BTreeMap<String, i64> =
            self.get_json(&url, "show updates").await?;

        let mut stubs = raw
            .into_iter()
            .map(|(key, updated)| {
                let id = key.parse::<i64>().map_err(|_| CatalogError::Deserialize {
                    context: "show updates".to_owned(),
                    source: <serde_json::Error as serde::de::Error>::custom(format!(
                        "show id key \"{key}\" is not an integer"
                    )),
                })?;
                Ok(ShowStub {
                    id,
                    updated: epoch_to_utc(updated),
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;
        stubs.sort_by_key(|s| s.id);
        Ok(stubs)
    }

    /// Shows whose upstream `updated` is strictly after `since`.
    ///
    /// Requests the narrowest update window that still covers `since`
    /// relative to `now`, then filters client-side.
    ///
    /// # Errors
    ///
    /// See [`TvMazeClient::fetch_updates`].
    pub async fn fetch_changed_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowStub>, CatalogError> {
        let window = UpdateWindow::covering(since, now);
        let stubs = self.fetch_updates(window).await?;
        Ok(stubs
            .into_iter()
            .filter(|stub| stub.updated.is_some_and(|u| u > since))
            .collect())
    }

    /// `GET /shows/{id}`.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`]; `NotFound` when the show was removed upstream.
    pub async fn fetch_show(&self, show_id: i64) -> Result<ShowDetail, CatalogError> {
        let url = format!("{}/shows/{show_id}", self.base_url);
        let raw: TvMazeShow = self.get_json(&url, &format!("show {show_id}")).await?;
        Ok(normalize_show(raw))
    }

    /// `GET /shows/{id}/seasons`.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`].
    pub async fn fetch_seasons(&self, show_id: i64) -> Result<Vec<Season>, CatalogError> {
        let url = format!("{}/shows/{show_id}/seasons", self.base_url);
        let raw: Vec<TvMazeSeason> = self
            .get_json(&url, &format!("seasons of show {show_id}"))
            .await?;
        Ok(raw.into_iter().map(normalize_season).collect())
    }

    /// Every episode of a show, specials included
    /// (`GET /shows/{id}/episodes?specials=1`).
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`].
    pub async fn fetch_show_episodes(&self, show_id: i64) -> Result<Vec<Episode>, CatalogError> {
        let url = format!("{}/shows/{show_id}/episodes?specials=1", self.base_url);
        let raw: Vec<TvMazeEpisode> = self
            .get_json(&url, &format!("episodes of show {show_id}"))
            .await?;
        Ok(raw.into_iter().map(normalize_episode).collect())
    }

    /// `GET /seasons/{id}/episodes`.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`].
    pub async fn fetch_season_episodes(
        &self,
        season_id: i64,
    ) -> Result<Vec<Episode>, CatalogError> {
        let url = format!("{}/seasons/{season_id}/episodes", self.base_url);
        let raw: Vec<TvMazeEpisode> = self
            .get_json(&url, &format!("episodes of season {season_id}"))
            .await?;
        Ok(raw.into_iter().map(normalize_episode).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, CatalogError> {
        self.pacer.wait_turn().await;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .or(Some(DEFAULT_RETRY_AFTER_SECS));
            return Err(CatalogError::RateLimited {
                url: url.to_owned(),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| CatalogError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
