//! The ingestion watermark, stored in `sync_state`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

pub const WATERMARK_KEY: &str = "ingest_watermark";

/// Reads the watermark. `None` until the first successful run records one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_watermark(pool: &PgPool) -> Result<Option<DateTime<Utc>>, DbError> {
    let value = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT value_at FROM sync_state WHERE key = $1",
    )
    .bind(WATERMARK_KEY)
    .fetch_optional(pool)
    .await?;
    Ok(value)
}

/// Moves the watermark forward to `at`.
///
/// The stored value never goes backwards: an older `at` leaves it unchanged.
/// Returns the value stored after the write.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_watermark(pool: &PgPool, at: DateTime<Utc>) -> Result<DateTime<Utc>, DbError> {
    let stored = sqlx::query_scalar::<_, DateTime<Utc>>(
        "INSERT INTO sync_state (key, value_at) VALUES ($1, $2) \
         ON CONFLICT (key) DO UPDATE SET \
             value_at   = GREATEST(sync_state.value_at, EXCLUDED.value_at), \
             updated_at = NOW() \
         RETURNING value_at",
    )
    .bind(WATERMARK_KEY)
    .bind(at)
    .fetch_one(pool)
    .await?;
    Ok(stored)
}
