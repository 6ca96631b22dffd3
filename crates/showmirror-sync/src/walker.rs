//! Cursors that turn the upstream catalog into batches of show stubs.

use chrono::{DateTime, Utc};
use showmirror_core::ShowStub;

use crate::error::RunError;
use crate::ports::{CatalogSource, MirrorStore};
use crate::retry::RetryPolicy;

/// Safety cap on index pages, in case upstream never returns an empty one.
pub const MAX_PAGES: u32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Start,
    FetchingPage(u32),
    Done,
    Failed,
}

/// A page of stubs produced by [`PageWalker::next_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPage {
    pub page: u32,
    pub stubs: Vec<ShowStub>,
}

/// Walks the paged show index from page 0, one page at a time.
#[derive(Debug)]
pub struct PageWalker {
    state: WalkState,
    max_pages: u32,
    failure: Option<String>,
}

impl Default for PageWalker {
    fn default() -> Self {
        Self::new(MAX_PAGES)
    }
}

impl PageWalker {
    #[must_use]
    pub fn new(max_pages: u32) -> Self {
        Self {
            state: WalkState::Start,
            max_pages,
            failure: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Fetches the next page.
    ///
    /// Returns `Ok(None)` once an empty page ends the walk, and keeps
    /// returning `Ok(None)` after that.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::PageFetch`] when the page fetch fails after
    /// retries, or [`RunError::PageLimit`] past `max_pages`. The walker is
    /// `Failed` afterwards and further calls return [`RunError::WalkFailed`]
    /// carrying the original cause.
    pub async fn next_page<C>(
        &mut self,
        catalog: &C,
        policy: &RetryPolicy,
    ) -> Result<Option<IndexPage>, RunError>
    where
        C: CatalogSource + ?Sized,
    {
        let page = match self.state {
            WalkState::Start => 0,
            WalkState::FetchingPage(page) => page,
            WalkState::Done => return Ok(None),
            WalkState::Failed => {
                return Err(RunError::WalkFailed {
                    reason: self.failure.clone().unwrap_or_default(),
                })
            }
        };
        if page >= self.max_pages {
            return Err(self.fail(RunError::PageLimit {
                max_pages: self.max_pages,
            }));
        }
        self.state = WalkState::FetchingPage(page);

        let operation = format!("index page {page}");
        let stubs = match policy
            .execute(&operation, || catalog.fetch_index_page(page))
            .await
        {
            Ok(stubs) => stubs,
            Err(source) => return Err(self.fail(RunError::PageFetch { page, source })),
        };

        if stubs.is_empty() {
            tracing::debug!(page, "index walk reached an empty page");
            self.state = WalkState::Done;
            return Ok(None);
        }

        self.state = WalkState::FetchingPage(page + 1);
        Ok(Some(IndexPage { page, stubs }))
    }

    fn fail(&mut self, err: RunError) -> RunError {
        self.state = WalkState::Failed;
        self.failure = Some(err.to_string());
        err
    }
}

/// The single batch an incremental run processes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    pub since: DateTime<Utc>,
    pub stubs: Vec<ShowStub>,
}

/// Reads the watermark and fetches everything that changed after it.
///
/// # Errors
///
/// Returns [`RunError::NoWatermark`] before the first full ingest,
/// [`RunError::Watermark`] if the store cannot be read, or
/// [`RunError::ChangeFeed`] if the change feed fails after retries.
pub async fn changed_since_watermark<C, S>(
    catalog: &C,
    store: &S,
    policy: &RetryPolicy,
) -> Result<ChangeBatch, RunError>
where
    C: CatalogSource + ?Sized,
    S: MirrorStore + ?Sized,
{
    let since = store
        .get_watermark()
        .await
        .map_err(RunError::Watermark)?
        .ok_or(RunError::NoWatermark)?;

    let stubs = policy
        .execute("change feed", || catalog.fetch_changed_shows(since))
        .await
        .map_err(|source| RunError::ChangeFeed { since, source })?;

    tracing::info!(%since, changed = stubs.len(), "fetched changed shows");
    Ok(ChangeBatch { since, stubs })
}
