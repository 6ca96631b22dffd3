//! Database operations for `networks` and `web_channels`.

use chrono::{DateTime, Utc};
use showmirror_core::{Country, Network, WebChannel};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from `networks` or `web_channels`; both tables share a shape.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NetworkRow {
    pub id: i64,
    pub name: String,
    pub country_name: Option<String>,
    pub country_code: Option<String>,
    pub country_timezone: Option<String>,
    pub official_site: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts a network by upstream ID.
///
/// Returns `true` if the row was inserted or any column changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_network(conn: &mut PgConnection, network: &Network) -> Result<bool, DbError> {
    upsert_channel(
        conn,
        Table::Networks,
        network.id,
        &network.name,
        network.country.as_ref(),
        network.official_site.as_deref(),
    )
    .await
}

/// Upserts a web channel by upstream ID.
///
/// Returns `true` if the row was inserted or any column changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_web_channel(
    conn: &mut PgConnection,
    channel: &WebChannel,
) -> Result<bool, DbError> {
    upsert_channel(
        conn,
        Table::WebChannels,
        channel.id,
        &channel.name,
        channel.country.as_ref(),
        channel.official_site.as_deref(),
    )
    .await
}

/// Fetches a network by upstream ID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_network(pool: &PgPool, id: i64) -> Result<NetworkRow, DbError> {
    sqlx::query_as::<_, NetworkRow>(
        "SELECT id, name, country_name, country_code, country_timezone, official_site, \
                created_at, updated_at \
         FROM networks \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

#[derive(Clone, Copy)]
enum Table {
    Networks,
    WebChannels,
}

impl Table {
    fn upsert_sql(self) -> &'static str {
        match self {
            Table::Networks => {
                "INSERT INTO networks \
                     (id, name, country_name, country_code, country_timezone, official_site) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET \
                     name             = EXCLUDED.name, \
                     country_name     = EXCLUDED.country_name, \
                     country_code     = EXCLUDED.country_code, \
                     country_timezone = EXCLUDED.country_timezone, \
                     official_site    = EXCLUDED.official_site, \
                     updated_at       = NOW() \
                 WHERE (networks.name, networks.country_name, networks.country_code, \
                        networks.country_timezone, networks.official_site) \
                       IS DISTINCT FROM \
                       (EXCLUDED.name, EXCLUDED.country_name, EXCLUDED.country_code, \
                        EXCLUDED.country_timezone, EXCLUDED.official_site) \
                 RETURNING id"
            }
            Table::WebChannels => {
                "INSERT INTO web_channels \
                     (id, name, country_name, country_code, country_timezone, official_site) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET \
                     name             = EXCLUDED.name, \
                     country_name     = EXCLUDED.country_name, \
                     country_code     = EXCLUDED.country_code, \
                     country_timezone = EXCLUDED.country_timezone, \
                     official_site    = EXCLUDED.official_site, \
                     updated_at       = NOW() \
                 WHERE (web_channels.name, web_channels.country_name, web_channels.country_code, \
                        web_channels.country_timezone, web_channels.official_site) \
                       IS DISTINCT FROM \
                       (EXCLUDED.name, EXCLUDED.country_name, EXCLUDED.country_code, \
                        EXCLUDED.country_timezone, EXCLUDED.official_site) \
                 RETURNING id"
            }
        }
    }
}

async fn upsert_channel(
    conn: &mut PgConnection,
    table: Table,
    id: i64,
    name: &str,
    country: Option<&Country>,
    official_site: Option<&str>,
) -> Result<bool, DbError> {
    let changed = sqlx::query_scalar::<_, i64>(table.upsert_sql())
        .bind(id)
        .bind(name)
        .bind(country.and_then(|c| c.name.as_deref()))
        .bind(country.and_then(|c| c.code.as_deref()))
        .bind(country.and_then(|c| c.timezone.as_deref()))
        .bind(official_site)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(changed.is_some())
}
