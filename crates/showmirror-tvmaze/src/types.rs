//! TVMaze API response types.
//!
//! Only the fields the mirror stores are modelled; serde ignores the rest
//! (`_links`, `_embedded`, `dvdCountry`, ...).
//!
//! ### Dates
//! `premiered`, `ended`, `premiereDate`, `endDate` and `airdate` are
//! `YYYY-MM-DD` strings, but the API sends `""` for unknown episode airdates
//! and `null` elsewhere. They stay strings here and are parsed leniently in
//! `normalize.rs`.
//!
//! ### `updated`
//! Unix epoch seconds. Present on every show object, including index pages.
//!
//! ### `/updates/shows`
//! A JSON object mapping show ID (as a string key) to the epoch-seconds
//! `updated` value.

use serde::Deserialize;

/// One entry of `GET /shows?page=N`. The index returns full show objects;
/// the walker only needs the ID and change time.
#[derive(Debug, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub updated: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TvMazeImage {
    pub medium: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TvMazeRating {
    pub average: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TvMazeSchedule {
    pub time: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TvMazeCountry {
    pub name: Option<String>,
    pub code: Option<String>,
    pub timezone: Option<String>,
}

/// Shared shape of `network` and `webChannel` objects.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvMazeChannel {
    pub id: i64,
    pub name: String,
    pub country: Option<TvMazeCountry>,
    pub official_site: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TvMazeExternals {
    pub tvrage: Option<i64>,
    pub thetvdb: Option<i64>,
    pub imdb: Option<String>,
}

/// `GET /shows/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvMazeShow {
    pub id: i64,
    pub url: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub show_type: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub runtime: Option<i32>,
    pub average_runtime: Option<i32>,
    pub premiered: Option<String>,
    pub ended: Option<String>,
    pub official_site: Option<String>,
    pub schedule: Option<TvMazeSchedule>,
    pub rating: Option<TvMazeRating>,
    pub weight: Option<i32>,
    pub network: Option<TvMazeChannel>,
    pub web_channel: Option<TvMazeChannel>,
    pub externals: Option<TvMazeExternals>,
    pub image: Option<TvMazeImage>,
    pub summary: Option<String>,
    pub updated: Option<i64>,
}

/// `GET /shows/{id}/seasons`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvMazeSeason {
    pub id: i64,
    pub url: Option<String>,
    pub number: Option<i32>,
    pub name: Option<String>,
    pub episode_order: Option<i32>,
    pub premiere_date: Option<String>,
    pub end_date: Option<String>,
    pub network: Option<TvMazeChannel>,
    pub web_channel: Option<TvMazeChannel>,
    pub image: Option<TvMazeImage>,
    pub summary: Option<String>,
}

/// `GET /shows/{id}/episodes?specials=1` and `GET /seasons/{id}/episodes`.
#[derive(Debug, Deserialize)]
pub struct TvMazeEpisode {
    pub id: i64,
    pub url: Option<String>,
    pub name: Option<String>,
    pub season: Option<i32>,
    pub number: Option<i32>,
    #[serde(rename = "type")]
    pub episode_type: Option<String>,
    pub airdate: Option<String>,
    pub airtime: Option<String>,
    pub airstamp: Option<String>,
    pub runtime: Option<i32>,
    pub rating: Option<TvMazeRating>,
    pub image: Option<TvMazeImage>,
    pub summary: Option<String>,
}
