//! Production implementations of the ports: TVMaze over HTTP and the
//! Postgres mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use showmirror_core::{Episode, RefreshStats, Season, ShowDetail, ShowRefresh, ShowStub};
use showmirror_tvmaze::{CatalogError, TvMazeClient};
use sqlx::PgPool;

use crate::error::{FetchError, StoreError};
use crate::ports::{CatalogSource, MirrorStore};

impl From<CatalogError> for FetchError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        if err.is_transient() {
            FetchError::Transient {
                retry_after: err.retry_after(),
                message,
            }
        } else if err.is_not_found() {
            FetchError::NotFound { message }
        } else if matches!(err, CatalogError::Deserialize { .. }) {
            FetchError::Malformed { message }
        } else {
            FetchError::Permanent { message }
        }
    }
}

#[async_trait]
impl CatalogSource for TvMazeClient {
    async fn fetch_index_page(&self, page: u32) -> Result<Vec<ShowStub>, FetchError> {
        Ok(TvMazeClient::fetch_index_page(self, page).await?)
    }

    async fn fetch_changed_shows(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShowStub>, FetchError> {
        Ok(self.fetch_changed_since(since, Utc::now()).await?)
    }

    async fn fetch_show_detail(&self, show_id: i64) -> Result<ShowDetail, FetchError> {
        Ok(self.fetch_show(show_id).await?)
    }

    async fn fetch_seasons(&self, show_id: i64) -> Result<Vec<Season>, FetchError> {
        Ok(TvMazeClient::fetch_seasons(self, show_id).await?)
    }

    async fn fetch_show_episodes(&self, show_id: i64) -> Result<Vec<Episode>, FetchError> {
        Ok(TvMazeClient::fetch_show_episodes(self, show_id).await?)
    }

    async fn fetch_season_episodes(&self, season_id: i64) -> Result<Vec<Episode>, FetchError> {
        Ok(TvMazeClient::fetch_season_episodes(self, season_id).await?)
    }
}

/// The Postgres-backed mirror.
#[derive(Debug, Clone)]
pub struct PgMirrorStore {
    pool: PgPool,
}

impl PgMirrorStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MirrorStore for PgMirrorStore {
    async fn refresh_show(&self, refresh: &ShowRefresh) -> Result<RefreshStats, StoreError> {
        Ok(showmirror_db::refresh_show(&self.pool, refresh).await?)
    }

    async fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(showmirror_db::get_watermark(&self.pool).await?)
    }

    async fn set_watermark(&self, at: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        Ok(showmirror_db::set_watermark(&self.pool, at).await?)
    }
}
