//! Refreshing a single show: fetch, validate, write.

use showmirror_core::{Episode, RefreshStats, Season, ShowRefresh, ShowStub};

use crate::error::ShowError;
use crate::ports::{CatalogSource, MirrorStore};
use crate::retry::RetryPolicy;

/// Fetches the detail, seasons and episodes for `stub` and replaces the
/// show's mirrored rows in one store transaction.
///
/// Nothing is written until every fetch has succeeded and the payloads
/// validate, so a failure leaves the previous mirror of the show intact.
///
/// # Errors
///
/// Returns [`ShowError`] for the first fetch, validation, or store failure.
pub async fn process_show<C, S>(
    catalog: &C,
    store: &S,
    policy: &RetryPolicy,
    stub: &ShowStub,
) -> Result<RefreshStats, ShowError>
where
    C: CatalogSource + ?Sized,
    S: MirrorStore + ?Sized,
{
    let show_id = stub.id;
    let detail = policy
        .execute("show detail", || catalog.fetch_show_detail(show_id))
        .await
        .map_err(|source| ShowError::Fetch {
            show_id,
            what: "detail",
            source,
        })?;

    let (seasons, episodes) = expand(catalog, policy, show_id).await?;
    let refresh = ShowRefresh::assemble(show_id, detail, seasons, episodes)?;

    let stats = store
        .refresh_show(&refresh)
        .await
        .map_err(|source| ShowError::Store { show_id, source })?;

    tracing::debug!(
        show_id,
        show_changed = stats.show_changed,
        seasons = refresh.seasons.len(),
        episodes = refresh.episodes.len(),
        seasons_removed = stats.seasons_removed,
        episodes_removed = stats.episodes_removed,
        "show refreshed"
    );
    Ok(stats)
}

/// Fetches the season list and every episode of a show.
///
/// Uses the per-show episode listing when the catalog has one, otherwise
/// walks the seasons in order.
///
/// # Errors
///
/// Returns [`ShowError::Fetch`] if any fetch fails after retries.
pub async fn expand<C>(
    catalog: &C,
    policy: &RetryPolicy,
    show_id: i64,
) -> Result<(Vec<Season>, Vec<Episode>), ShowError>
where
    C: CatalogSource + ?Sized,
{
    let seasons = policy
        .execute("seasons", || catalog.fetch_seasons(show_id))
        .await
        .map_err(|source| ShowError::Fetch {
            show_id,
            what: "seasons",
            source,
        })?;

    let episodes = if catalog.has_show_episode_listing() {
        policy
            .execute("episodes", || catalog.fetch_show_episodes(show_id))
            .await
            .map_err(|source| ShowError::Fetch {
                show_id,
                what: "episodes",
                source,
            })?
    } else {
        let mut episodes = Vec::new();
        for season in &seasons {
            let season_id = season.id;
            let batch = policy
                .execute("season episodes", || catalog.fetch_season_episodes(season_id))
                .await
                .map_err(|source| ShowError::Fetch {
                    show_id,
                    what: "season episodes",
                    source,
                })?;
            episodes.extend(batch);
        }
        episodes
    };

    Ok((seasons, episodes))
}
