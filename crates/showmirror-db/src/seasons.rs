//! Database operations for `seasons`.

use chrono::{DateTime, NaiveDate, Utc};
use showmirror_core::Season;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `seasons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeasonRow {
    pub id: i64,
    pub show_id: i64,
    pub url: Option<String>,
    pub number: Option<i32>,
    pub name: Option<String>,
    pub episode_order: Option<i32>,
    pub premiere_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub network_id: Option<i64>,
    pub web_channel_id: Option<i64>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts a season of `show_id` keyed by upstream ID.
///
/// Returns `true` if the row was inserted or changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_season(
    conn: &mut PgConnection,
    show_id: i64,
    season: &Season,
) -> Result<bool, DbError> {
    let changed = sqlx::query_scalar::<_, i64>(
        "INSERT INTO seasons \
             (id, show_id, url, number, name, episode_order, premiere_date, end_date, \
              network_id, web_channel_id, image_medium, image_original, summary) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (id) DO UPDATE SET \
             show_id        = EXCLUDED.show_id, \
             url            = EXCLUDED.url, \
             number         = EXCLUDED.number, \
             name           = EXCLUDED.name, \
             episode_order  = EXCLUDED.episode_order, \
             premiere_date  = EXCLUDED.premiere_date, \
             end_date       = EXCLUDED.end_date, \
             network_id     = EXCLUDED.network_id, \
             web_channel_id = EXCLUDED.web_channel_id, \
             image_medium   = EXCLUDED.image_medium, \
             image_original = EXCLUDED.image_original, \
             summary        = EXCLUDED.summary, \
             updated_at     = NOW() \
         WHERE (seasons.show_id, seasons.url, seasons.number, seasons.name, \
                seasons.episode_order, seasons.premiere_date, seasons.end_date, \
                seasons.network_id, seasons.web_channel_id, seasons.image_medium, \
                seasons.image_original, seasons.summary) \
               IS DISTINCT FROM \
               (EXCLUDED.show_id, EXCLUDED.url, EXCLUDED.number, EXCLUDED.name, \
                EXCLUDED.episode_order, EXCLUDED.premiere_date, EXCLUDED.end_date, \
                EXCLUDED.network_id, EXCLUDED.web_channel_id, EXCLUDED.image_medium, \
                EXCLUDED.image_original, EXCLUDED.summary) \
         RETURNING id",
    )
    .bind(season.id)
    .bind(show_id)
    .bind(&season.url)
    .bind(season.number)
    .bind(&season.name)
    .bind(season.episode_order)
    .bind(season.premiere_date)
    .bind(season.end_date)
    .bind(season.network.as_ref().map(|n| n.id))
    .bind(season.web_channel.as_ref().map(|w| w.id))
    .bind(&season.image_medium)
    .bind(&season.image_original)
    .bind(&season.summary)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(changed.is_some())
}

/// Deletes every season of `show_id` whose ID is not in `keep`.
///
/// Episodes referencing those seasons must be gone or re-parented first.
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_seasons_except(
    conn: &mut PgConnection,
    show_id: i64,
    keep: &[i64],
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM seasons WHERE show_id = $1 AND NOT (id = ANY($2))")
        .bind(show_id)
        .bind(keep)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Seasons of a show ordered by number.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_seasons(pool: &PgPool, show_id: i64) -> Result<Vec<SeasonRow>, DbError> {
    let rows = sqlx::query_as::<_, SeasonRow>(
        "SELECT id, show_id, url, number, name, episode_order, premiere_date, end_date, \
                network_id, web_channel_id, image_medium, image_original, summary, \
                created_at, updated_at \
         FROM seasons \
         WHERE show_id = $1 \
         ORDER BY number NULLS LAST, id",
    )
    .bind(show_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
