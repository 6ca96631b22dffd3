//! Database operations for `episodes`.

use chrono::{DateTime, NaiveDate, Utc};
use showmirror_core::PlacedEpisode;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `episodes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EpisodeRow {
    pub id: i64,
    pub show_id: i64,
    /// `NULL` for specials outside any mirrored season.
    pub season_id: Option<i64>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub season_number: Option<i32>,
    pub number: Option<i32>,
    pub episode_type: Option<String>,
    pub airdate: Option<NaiveDate>,
    pub airtime: Option<String>,
    pub airstamp: Option<DateTime<Utc>>,
    pub runtime: Option<i32>,
    pub rating: Option<f64>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts an episode of `show_id` keyed by upstream ID.
///
/// The parent season (if any) must already be written.
/// Returns `true` if the row was inserted or changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_episode(
    conn: &mut PgConnection,
    show_id: i64,
    placed: &PlacedEpisode,
) -> Result<bool, DbError> {
    let episode = &placed.episode;
    let changed = sqlx::query_scalar::<_, i64>(
        "INSERT INTO episodes \
             (id, show_id, season_id, url, name, season_number, number, episode_type, \
              airdate, airtime, airstamp, runtime, rating, image_medium, image_original, \
              summary) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (id) DO UPDATE SET \
             show_id        = EXCLUDED.show_id, \
             season_id      = EXCLUDED.season_id, \
             url            = EXCLUDED.url, \
             name           = EXCLUDED.name, \
             season_number  = EXCLUDED.season_number, \
             number         = EXCLUDED.number, \
             episode_type   = EXCLUDED.episode_type, \
             airdate        = EXCLUDED.airdate, \
             airtime        = EXCLUDED.airtime, \
             airstamp       = EXCLUDED.airstamp, \
             runtime        = EXCLUDED.runtime, \
             rating         = EXCLUDED.rating, \
             image_medium   = EXCLUDED.image_medium, \
             image_original = EXCLUDED.image_original, \
             summary        = EXCLUDED.summary, \
             updated_at     = NOW() \
         WHERE (episodes.show_id, episodes.season_id, episodes.url, episodes.name, \
                episodes.season_number, episodes.number, episodes.episode_type, \
                episodes.airdate, episodes.airtime, episodes.airstamp, episodes.runtime, \
                episodes.rating, episodes.image_medium, episodes.image_original, \
                episodes.summary) \
               IS DISTINCT FROM \
               (EXCLUDED.show_id, EXCLUDED.season_id, EXCLUDED.url, EXCLUDED.name, \
                EXCLUDED.season_number, EXCLUDED.number, EXCLUDED.episode_type, \
                EXCLUDED.airdate, EXCLUDED.airtime, EXCLUDED.airstamp, EXCLUDED.runtime, \
                EXCLUDED.rating, EXCLUDED.image_medium, EXCLUDED.image_original, \
                EXCLUDED.summary) \
         RETURNING id",
    )
    .bind(episode.id)
    .bind(show_id)
    .bind(placed.season_id)
    .bind(&episode.url)
    .bind(&episode.name)
    .bind(episode.season_number)
    .bind(episode.number)
    .bind(&episode.episode_type)
    .bind(episode.airdate)
    .bind(&episode.airtime)
    .bind(episode.airstamp)
    .bind(episode.runtime)
    .bind(episode.rating)
    .bind(&episode.image_medium)
    .bind(&episode.image_original)
    .bind(&episode.summary)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(changed.is_some())
}

/// Deletes every episode of `show_id` whose ID is not in `keep`.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_episodes_except(
    conn: &mut PgConnection,
    show_id: i64,
    keep: &[i64],
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM episodes WHERE show_id = $1 AND NOT (id = ANY($2))")
        .bind(show_id)
        .bind(keep)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Episodes of a show in airing order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_episodes(pool: &PgPool, show_id: i64) -> Result<Vec<EpisodeRow>, DbError> {
    let rows = sqlx::query_as::<_, EpisodeRow>(
        "SELECT id, show_id, season_id, url, name, season_number, number, episode_type, \
                airdate, airtime, airstamp, runtime, rating, image_medium, image_original, \
                summary, created_at, updated_at \
         FROM episodes \
         WHERE show_id = $1 \
         ORDER BY season_number NULLS LAST, number NULLS LAST, id",
    )
    .bind(show_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
