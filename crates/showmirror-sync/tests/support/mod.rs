//! In-memory catalog and store used by the orchestration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use showmirror_core::{
    Episode, Externals, RefreshStats, Season, ShowDetail, ShowRefresh, ShowStub,
};
use showmirror_sync::{
    CatalogSource, FetchError, MirrorStore, Orchestrator, OrchestratorSettings, RetryPolicy,
    StoreError,
};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn stub(id: i64) -> ShowStub {
    ShowStub::new(id)
}

pub fn stubs(ids: &[i64]) -> Vec<ShowStub> {
    ids.iter().copied().map(stub).collect()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn show(id: i64) -> ShowDetail {
    ShowDetail {
        id,
        url: None,
        name: format!("Show {id}"),
        show_type: Some("Scripted".to_string()),
        language: Some("English".to_string()),
        status: Some("Running".to_string()),
        runtime: Some(30),
        average_runtime: Some(30),
        premiered: None,
        ended: None,
        official_site: None,
        schedule_time: None,
        schedule_days: Vec::new(),
        rating: None,
        weight: None,
        network: None,
        web_channel: None,
        externals: Externals::default(),
        image_medium: None,
        image_original: None,
        summary: None,
        updated: Some(at(1_700_000_000)),
        genres: vec!["Comedy".to_string()],
    }
}

pub fn season(id: i64, number: i32) -> Season {
    Season {
        id,
        url: None,
        number: Some(number),
        name: None,
        episode_order: None,
        premiere_date: None,
        end_date: None,
        network: None,
        web_channel: None,
        image_medium: None,
        image_original: None,
        summary: None,
    }
}

pub fn episode(id: i64, season_number: i32, number: i32) -> Episode {
    Episode {
        id,
        url: None,
        name: Some(format!("Episode {id}")),
        season_number: Some(season_number),
        number: Some(number),
        episode_type: Some("regular".to_string()),
        airdate: None,
        airtime: None,
        airstamp: None,
        runtime: Some(30),
        rating: None,
        image_medium: None,
        image_original: None,
        summary: None,
    }
}

/// A show with `season_count` seasons of two episodes each.
/// Season IDs are `id * 10 + n`, episode IDs `id * 100 + 10 * n + e`.
pub fn catalog_show(id: i64, season_count: i32) -> CatalogShow {
    let seasons = (1..=season_count)
        .map(|n| season(id * 10 + i64::from(n), n))
        .collect();
    let episodes = (1..=season_count)
        .flat_map(|n| (1..=2).map(move |e| episode(id * 100 + i64::from(10 * n + e), n, e)))
        .collect();
    CatalogShow {
        detail: show(id),
        seasons,
        episodes,
    }
}

pub fn settings(max_concurrent_shows: usize) -> OrchestratorSettings {
    OrchestratorSettings {
        retry: RetryPolicy::immediate(3),
        max_concurrent_shows,
        max_pages: 100,
    }
}

pub fn orchestrator(
    catalog: &Arc<FakeCatalog>,
    store: &Arc<FakeStore>,
    max_concurrent_shows: usize,
) -> Orchestrator {
    let catalog: Arc<dyn CatalogSource> = catalog.clone();
    let store: Arc<dyn MirrorStore> = store.clone();
    Orchestrator::new(catalog, store, settings(max_concurrent_shows))
}

// ---------------------------------------------------------------------------
// FakeCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CatalogShow {
    pub detail: ShowDetail,
    pub seasons: Vec<Season>,
    pub episodes: Vec<Episode>,
}

/// Scripted failure for a page or show detail request.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Every attempt fails transiently.
    AlwaysTransient,
    /// The first `n` attempts fail transiently.
    TransientTimes(u32),
    NotFound,
    /// The fetch panics instead of returning.
    Panic,
}

#[derive(Default)]
pub struct FakeCatalog {
    pages: Vec<Vec<ShowStub>>,
    page_faults: HashMap<u32, Fault>,
    changed: Vec<ShowStub>,
    shows: HashMap<i64, CatalogShow>,
    detail_faults: HashMap<i64, Fault>,
    per_season_only: bool,
    detail_delay: Duration,
    cancel_on_page: Option<(u32, CancellationToken)>,

    pub page_requests: Mutex<Vec<u32>>,
    pub change_requests: Mutex<Vec<DateTime<Utc>>>,
    detail_attempts: Mutex<HashMap<i64, u32>>,
    page_attempts: Mutex<HashMap<u32, u32>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index pages in order; requests past the end get an empty page.
    pub fn with_pages(mut self, pages: Vec<Vec<ShowStub>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_changed(mut self, changed: Vec<ShowStub>) -> Self {
        self.changed = changed;
        self
    }

    pub fn with_show(mut self, show: CatalogShow) -> Self {
        self.shows.insert(show.detail.id, show);
        self
    }

    /// Registers a one-season show for every ID.
    pub fn with_simple_shows(mut self, ids: &[i64]) -> Self {
        for &id in ids {
            self.shows.insert(id, catalog_show(id, 1));
        }
        self
    }

    pub fn with_page_fault(mut self, page: u32, fault: Fault) -> Self {
        self.page_faults.insert(page, fault);
        self
    }

    pub fn with_detail_fault(mut self, show_id: i64, fault: Fault) -> Self {
        self.detail_faults.insert(show_id, fault);
        self
    }

    pub fn per_season_only(mut self) -> Self {
        self.per_season_only = true;
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    /// Cancels `token` while serving index page `page`.
    pub fn cancel_on_page(mut self, page: u32, token: CancellationToken) -> Self {
        self.cancel_on_page = Some((page, token));
        self
    }

    pub fn detail_attempts(&self, show_id: i64) -> u32 {
        self.detail_attempts
            .lock()
            .unwrap()
            .get(&show_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.page_requests.lock().unwrap().clone()
    }

    fn apply_fault(fault: Option<&Fault>, attempt: u32, what: &str) -> Result<(), FetchError> {
        match fault {
            None => Ok(()),
            Some(Fault::AlwaysTransient) => Err(FetchError::transient(format!("{what}: 503"))),
            Some(Fault::TransientTimes(n)) if attempt <= *n => {
                Err(FetchError::transient(format!("{what}: 503")))
            }
            Some(Fault::TransientTimes(_)) => Ok(()),
            Some(Fault::NotFound) => Err(FetchError::NotFound {
                message: format!("{what}: 404"),
            }),
            Some(Fault::Panic) => panic!("{what}: malformed payload"),
        }
    }

    fn lookup(&self, show_id: i64) -> Result<&CatalogShow, FetchError> {
        self.shows.get(&show_id).ok_or_else(|| FetchError::NotFound {
            message: format!("show {show_id}: 404"),
        })
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_index_page(&self, page: u32) -> Result<Vec<ShowStub>, FetchError> {
        self.page_requests.lock().unwrap().push(page);
        let attempt = {
            let mut attempts = self.page_attempts.lock().unwrap();
            let n = attempts.entry(page).or_insert(0);
            *n += 1;
            *n
        };
        Self::apply_fault(self.page_faults.get(&page), attempt, &format!("page {page}"))?;
        if let Some((cancel_page, token)) = &self.cancel_on_page {
            if *cancel_page == page {
                token.cancel();
            }
        }
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }

    async fn fetch_changed_shows(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShowStub>, FetchError> {
        self.change_requests.lock().unwrap().push(since);
        Ok(self.changed.clone())
    }

    async fn fetch_show_detail(&self, show_id: i64) -> Result<ShowDetail, FetchError> {
        let attempt = {
            let mut attempts = self.detail_attempts.lock().unwrap();
            let n = attempts.entry(show_id).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.detail_delay.is_zero() {
            tokio::time::sleep(self.detail_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Self::apply_fault(
            self.detail_faults.get(&show_id),
            attempt,
            &format!("show {show_id}"),
        )?;
        Ok(self.lookup(show_id)?.detail.clone())
    }

    async fn fetch_seasons(&self, show_id: i64) -> Result<Vec<Season>, FetchError> {
        Ok(self.lookup(show_id)?.seasons.clone())
    }

    fn has_show_episode_listing(&self) -> bool {
        !self.per_season_only
    }

    async fn fetch_show_episodes(&self, show_id: i64) -> Result<Vec<Episode>, FetchError> {
        if self.per_season_only {
            return Err(FetchError::Permanent {
                message: "no per-show episode listing".to_string(),
            });
        }
        Ok(self.lookup(show_id)?.episodes.clone())
    }

    async fn fetch_season_episodes(&self, season_id: i64) -> Result<Vec<Episode>, FetchError> {
        for show in self.shows.values() {
            if let Some(season) = show.seasons.iter().find(|s| s.id == season_id) {
                return Ok(show
                    .episodes
                    .iter()
                    .filter(|e| e.season_number == season.number)
                    .cloned()
                    .collect());
            }
        }
        Err(FetchError::NotFound {
            message: format!("season {season_id}: 404"),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    shows: Mutex<BTreeMap<i64, ShowRefresh>>,
    watermark: Mutex<Option<DateTime<Utc>>>,
    failing_shows: HashSet<i64>,
    fail_watermark_writes: AtomicBool,
    pub refresh_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermark(self, at: DateTime<Utc>) -> Self {
        *self.watermark.lock().unwrap() = Some(at);
        self
    }

    pub fn failing_show(mut self, show_id: i64) -> Self {
        self.failing_shows.insert(show_id);
        self
    }

    pub fn set_fail_watermark_writes(&self, fail: bool) {
        self.fail_watermark_writes.store(fail, Ordering::SeqCst);
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        *self.watermark.lock().unwrap()
    }

    pub fn show_ids(&self) -> Vec<i64> {
        self.shows.lock().unwrap().keys().copied().collect()
    }

    pub fn stored(&self, show_id: i64) -> Option<ShowRefresh> {
        self.shows.lock().unwrap().get(&show_id).cloned()
    }
}

#[async_trait]
impl MirrorStore for FakeStore {
    async fn refresh_show(&self, refresh: &ShowRefresh) -> Result<RefreshStats, StoreError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let show_id = refresh.show_id();
        if self.failing_shows.contains(&show_id) {
            return Err(StoreError::Other(format!("write for show {show_id} rejected")));
        }

        let mut shows = self.shows.lock().unwrap();
        let previous = shows.insert(show_id, refresh.clone());
        let stats = match previous {
            None => RefreshStats {
                show_changed: true,
                channels_written: usize::from(refresh.show.network.is_some())
                    + usize::from(refresh.show.web_channel.is_some()),
                genres_linked: refresh.genres.len(),
                seasons_written: refresh.seasons.len(),
                episodes_written: refresh.episodes.len(),
                ..RefreshStats::default()
            },
            Some(previous) if previous == *refresh => RefreshStats::default(),
            Some(previous) => RefreshStats {
                show_changed: previous.show != refresh.show,
                channels_written: usize::from(previous.show.network != refresh.show.network)
                    + usize::from(previous.show.web_channel != refresh.show.web_channel),
                seasons_removed: previous
                    .seasons
                    .iter()
                    .filter(|old| refresh.seasons.iter().all(|s| s.id != old.id))
                    .count(),
                episodes_removed: previous
                    .episodes
                    .iter()
                    .filter(|old| {
                        refresh
                            .episodes
                            .iter()
                            .all(|e| e.episode.id != old.episode.id)
                    })
                    .count(),
                seasons_written: refresh.seasons.len(),
                episodes_written: refresh.episodes.len(),
                ..RefreshStats::default()
            },
        };
        Ok(stats)
    }

    async fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.watermark())
    }

    async fn set_watermark(&self, at: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        if self.fail_watermark_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("connection lost before commit".to_string()));
        }
        let mut watermark = self.watermark.lock().unwrap();
        let stored = watermark.map_or(at, |current| current.max(at));
        *watermark = Some(stored);
        Ok(stored)
    }
}
