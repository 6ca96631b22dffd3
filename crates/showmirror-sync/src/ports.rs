//! The two seams the orchestrator runs against: an upstream catalog and the
//! local mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use showmirror_core::{Episode, RefreshStats, Season, ShowDetail, ShowRefresh, ShowStub};

use crate::error::{FetchError, StoreError};

/// Read port over the upstream show catalog.
///
/// Each method is one request; retrying is the caller's job.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the show index. An empty page means the walk is over.
    async fn fetch_index_page(&self, page: u32) -> Result<Vec<ShowStub>, FetchError>;

    /// Shows whose upstream timestamp is strictly newer than `since`.
    async fn fetch_changed_shows(&self, since: DateTime<Utc>)
        -> Result<Vec<ShowStub>, FetchError>;

    async fn fetch_show_detail(&self, show_id: i64) -> Result<ShowDetail, FetchError>;

    async fn fetch_seasons(&self, show_id: i64) -> Result<Vec<Season>, FetchError>;

    /// Whether [`CatalogSource::fetch_show_episodes`] is available. When it
    /// is not, episodes are fetched season by season.
    fn has_show_episode_listing(&self) -> bool {
        true
    }

    /// Every episode of a show, specials included.
    async fn fetch_show_episodes(&self, show_id: i64) -> Result<Vec<Episode>, FetchError>;

    async fn fetch_season_episodes(&self, season_id: i64) -> Result<Vec<Episode>, FetchError>;
}

/// Write port over the local mirror.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Replaces one show's mirrored rows atomically.
    async fn refresh_show(&self, refresh: &ShowRefresh) -> Result<RefreshStats, StoreError>;

    async fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Moves the watermark forward; never backwards. Returns the stored value.
    async fn set_watermark(&self, at: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError>;
}
