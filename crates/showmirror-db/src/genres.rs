//! Database operations for `genres` and `show_genres`.

use std::collections::HashSet;

use showmirror_core::genre_key;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// Association changes made by [`replace_show_genres`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenreDiff {
    pub linked: usize,
    pub unlinked: usize,
}

/// Returns the ID of the genre whose case-folded name matches `name`,
/// creating it if absent.
///
/// The first spelling seen wins; later casings reuse the existing row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or lookup fails.
pub async fn get_or_create_genre(conn: &mut PgConnection, name: &str) -> Result<i64, DbError> {
    let key = genre_key(name);

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO genres (name, name_key) VALUES ($1, $2) \
         ON CONFLICT (name_key) DO NOTHING \
         RETURNING id",
    )
    .bind(name)
    .bind(&key)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM genres WHERE name_key = $1")
        .bind(&key)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

/// Makes the show's genre links exactly `names`.
///
/// Loads the current links, then removes the stale ones and adds the missing
/// ones. `names` must already be normalized and unique by key. Run inside
/// the show's refresh transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn replace_show_genres(
    conn: &mut PgConnection,
    show_id: i64,
    names: &[String],
) -> Result<GenreDiff, DbError> {
    // Lock genre rows in a stable order so concurrent refreshes of shows
    // sharing genres cannot deadlock.
    let mut ordered: Vec<&String> = names.iter().collect();
    ordered.sort_by_key(|name| genre_key(name));

    let mut desired = HashSet::with_capacity(ordered.len());
    for name in ordered {
        desired.insert(get_or_create_genre(conn, name).await?);
    }

    let existing: HashSet<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT genre_id FROM show_genres WHERE show_id = $1",
    )
    .bind(show_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    let to_remove: Vec<i64> = existing.difference(&desired).copied().collect();
    let to_add: Vec<i64> = desired.difference(&existing).copied().collect();

    if !to_remove.is_empty() {
        sqlx::query("DELETE FROM show_genres WHERE show_id = $1 AND genre_id = ANY($2)")
            .bind(show_id)
            .bind(&to_remove)
            .execute(&mut *conn)
            .await?;
    }

    if !to_add.is_empty() {
        sqlx::query(
            "INSERT INTO show_genres (show_id, genre_id) \
             SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT (show_id, genre_id) DO NOTHING",
        )
        .bind(show_id)
        .bind(&to_add)
        .execute(&mut *conn)
        .await?;
    }

    Ok(GenreDiff {
        linked: to_add.len(),
        unlinked: to_remove.len(),
    })
}

/// Genre names linked to a show, alphabetically.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_show_genres(pool: &PgPool, show_id: i64) -> Result<Vec<String>, DbError> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT g.name \
         FROM show_genres sg \
         JOIN genres g ON g.id = sg.genre_id \
         WHERE sg.show_id = $1 \
         ORDER BY g.name",
    )
    .bind(show_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}
