//! Applies a whole [`ShowRefresh`] in one transaction.

use std::collections::BTreeMap;
use std::time::Duration;

use showmirror_core::{Network, RefreshStats, ShowRefresh, WebChannel};
use sqlx::{PgConnection, PgPool};

use crate::episodes::{delete_episodes_except, upsert_episode};
use crate::genres::replace_show_genres;
use crate::networks::{upsert_network, upsert_web_channel};
use crate::seasons::{delete_seasons_except, upsert_season};
use crate::shows::upsert_show;
use crate::DbError;

/// Extra attempts after a deadlock or serialization failure.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Replaces everything mirrored for one show with `refresh`.
///
/// Channels, the show row, genre links, seasons and episodes are written
/// parent-first inside a single transaction; stale episodes are then removed
/// before stale seasons. Either the whole refresh commits or nothing does,
/// so a failure leaves the previously mirrored rows untouched.
///
/// The transaction is retried a few times when Postgres aborts it with a
/// deadlock or serialization failure.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn refresh_show(pool: &PgPool, refresh: &ShowRefresh) -> Result<RefreshStats, DbError> {
    let mut attempt = 0u32;
    loop {
        match try_refresh_show(pool, refresh).await {
            Err(DbError::Sqlx(err))
                if attempt < MAX_CONFLICT_RETRIES && is_transaction_conflict(&err) =>
            {
                attempt += 1;
                tracing::warn!(
                    show_id = refresh.show_id(),
                    attempt,
                    error = %err,
                    "show refresh hit a transaction conflict, retrying"
                );
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}

async fn try_refresh_show(
    pool: &PgPool,
    refresh: &ShowRefresh,
) -> Result<RefreshStats, DbError> {
    let mut tx = pool.begin().await?;
    let stats = apply_refresh(&mut *tx, refresh).await?;
    tx.commit().await?;
    Ok(stats)
}

async fn apply_refresh(
    conn: &mut PgConnection,
    refresh: &ShowRefresh,
) -> Result<RefreshStats, DbError> {
    let show_id = refresh.show_id();
    let mut stats = RefreshStats::default();

    // BTreeMap gives a stable lock order across concurrent refreshes.
    let mut networks: BTreeMap<i64, &Network> = BTreeMap::new();
    let mut web_channels: BTreeMap<i64, &WebChannel> = BTreeMap::new();
    for network in refresh
        .show
        .network
        .iter()
        .chain(refresh.seasons.iter().filter_map(|s| s.network.as_ref()))
    {
        networks.entry(network.id).or_insert(network);
    }
    for channel in refresh
        .show
        .web_channel
        .iter()
        .chain(refresh.seasons.iter().filter_map(|s| s.web_channel.as_ref()))
    {
        web_channels.entry(channel.id).or_insert(channel);
    }
    for network in networks.values() {
        if upsert_network(conn, network).await? {
            stats.channels_written += 1;
        }
    }
    for channel in web_channels.values() {
        if upsert_web_channel(conn, channel).await? {
            stats.channels_written += 1;
        }
    }

    stats.show_changed = upsert_show(conn, &refresh.show).await?;

    let genres = replace_show_genres(conn, show_id, &refresh.genres).await?;
    stats.genres_linked = genres.linked;
    stats.genres_unlinked = genres.unlinked;

    for season in &refresh.seasons {
        if upsert_season(conn, show_id, season).await? {
            stats.seasons_written += 1;
        }
    }

    for placed in &refresh.episodes {
        if upsert_episode(conn, show_id, placed).await? {
            stats.episodes_written += 1;
        }
    }

    let episode_ids: Vec<i64> = refresh.episodes.iter().map(|p| p.episode.id).collect();
    let season_ids: Vec<i64> = refresh.seasons.iter().map(|s| s.id).collect();
    stats.episodes_removed = to_usize(delete_episodes_except(conn, show_id, &episode_ids).await?);
    stats.seasons_removed = to_usize(delete_seasons_except(conn, show_id, &season_ids).await?);

    Ok(stats)
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// `40P01` deadlock_detected, `40001` serialization_failure.
fn is_transaction_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40P01" | "40001")),
        _ => false,
    }
}
