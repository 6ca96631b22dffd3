//! Database operations for `shows`.

use chrono::{DateTime, NaiveDate, Utc};
use showmirror_core::ShowDetail;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `shows` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShowRow {
    pub id: i64,
    pub url: Option<String>,
    pub name: String,
    pub show_type: Option<String>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub runtime: Option<i32>,
    pub average_runtime: Option<i32>,
    pub premiered: Option<NaiveDate>,
    pub ended: Option<NaiveDate>,
    pub official_site: Option<String>,
    pub schedule_time: Option<String>,
    pub schedule_days: Vec<String>,
    pub rating: Option<f64>,
    pub weight: Option<i32>,
    pub network_id: Option<i64>,
    pub web_channel_id: Option<i64>,
    pub tvrage_id: Option<i64>,
    pub thetvdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub summary: Option<String>,
    pub upstream_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts a show row keyed by upstream ID.
///
/// Every mirrored column is overwritten from `show`, but only when at least
/// one differs; an identical payload leaves the row (and `updated_at`)
/// untouched. The referenced network and web channel must already exist.
///
/// Returns `true` if the row was inserted or changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_show(conn: &mut PgConnection, show: &ShowDetail) -> Result<bool, DbError> {
    let changed = sqlx::query_scalar::<_, i64>(
        "INSERT INTO shows \
             (id, url, name, show_type, language, status, runtime, average_runtime, \
              premiered, ended, official_site, schedule_time, schedule_days, rating, weight, \
              network_id, web_channel_id, tvrage_id, thetvdb_id, imdb_id, \
              image_medium, image_original, summary, upstream_updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, \
                 $21, $22, $23, $24) \
         ON CONFLICT (id) DO UPDATE SET \
             url                 = EXCLUDED.url, \
             name                = EXCLUDED.name, \
             show_type           = EXCLUDED.show_type, \
             language            = EXCLUDED.language, \
             status              = EXCLUDED.status, \
             runtime             = EXCLUDED.runtime, \
             average_runtime     = EXCLUDED.average_runtime, \
             premiered           = EXCLUDED.premiered, \
             ended               = EXCLUDED.ended, \
             official_site       = EXCLUDED.official_site, \
             schedule_time       = EXCLUDED.schedule_time, \
             schedule_days       = EXCLUDED.schedule_days, \
             rating              = EXCLUDED.rating, \
             weight              = EXCLUDED.weight, \
             network_id          = EXCLUDED.network_id, \
             web_channel_id      = EXCLUDED.web_channel_id, \
             tvrage_id           = EXCLUDED.tvrage_id, \
             thetvdb_id          = EXCLUDED.thetvdb_id, \
             imdb_id             = EXCLUDED.imdb_id, \
             image_medium        = EXCLUDED.image_medium, \
             image_original      = EXCLUDED.image_original, \
             summary             = EXCLUDED.summary, \
             upstream_updated_at = EXCLUDED.upstream_updated_at, \
             updated_at          = NOW() \
         WHERE (shows.url, shows.name, shows.show_type, shows.language, shows.status, \
                shows.runtime, shows.average_runtime, shows.premiered, shows.ended, \
                shows.official_site, shows.schedule_time, shows.schedule_days, shows.rating, \
                shows.weight, shows.network_id, shows.web_channel_id, shows.tvrage_id, \
                shows.thetvdb_id, shows.imdb_id, shows.image_medium, shows.image_original, \
                shows.summary, shows.upstream_updated_at) \
               IS DISTINCT FROM \
               (EXCLUDED.url, EXCLUDED.name, EXCLUDED.show_type, EXCLUDED.language, \
                EXCLUDED.status, EXCLUDED.runtime, EXCLUDED.average_runtime, \
                EXCLUDED.premiered, EXCLUDED.ended, EXCLUDED.official_site, \
                EXCLUDED.schedule_time, EXCLUDED.schedule_days, EXCLUDED.rating, \
                EXCLUDED.weight, EXCLUDED.network_id, EXCLUDED.web_channel_id, \
                EXCLUDED.tvrage_id, EXCLUDED.thetvdb_id, EXCLUDED.imdb_id, \
                EXCLUDED.image_medium, EXCLUDED.image_original, EXCLUDED.summary, \
                EXCLUDED.upstream_updated_at) \
         RETURNING id",
    )
    .bind(show.id)
    .bind(&show.url)
    .bind(&show.name)
    .bind(&show.show_type)
    .bind(&show.language)
    .bind(&show.status)
    .bind(show.runtime)
    .bind(show.average_runtime)
    .bind(show.premiered)
    .bind(show.ended)
    .bind(&show.official_site)
    .bind(&show.schedule_time)
    .bind(&show.schedule_days)
    .bind(show.rating)
    .bind(show.weight)
    .bind(show.network.as_ref().map(|n| n.id))
    .bind(show.web_channel.as_ref().map(|w| w.id))
    .bind(show.externals.tvrage)
    .bind(show.externals.thetvdb)
    .bind(&show.externals.imdb)
    .bind(&show.image_medium)
    .bind(&show.image_original)
    .bind(&show.summary)
    .bind(show.updated)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(changed.is_some())
}

/// Fetches a show by upstream ID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_show(pool: &PgPool, id: i64) -> Result<ShowRow, DbError> {
    sqlx::query_as::<_, ShowRow>(
        "SELECT id, url, name, show_type, language, status, runtime, average_runtime, \
                premiered, ended, official_site, schedule_time, schedule_days, rating, weight, \
                network_id, web_channel_id, tvrage_id, thetvdb_id, imdb_id, \
                image_medium, image_original, summary, upstream_updated_at, \
                created_at, updated_at \
         FROM shows \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Total number of mirrored shows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_shows(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shows")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
