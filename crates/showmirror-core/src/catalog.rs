//! Catalog entities as the mirror understands them, independent of the
//! upstream wire format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A show reference emitted by a walker. Carries just enough to dispatch
/// the detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowStub {
    pub id: i64,
    /// Upstream last-change time, when the index reported one.
    pub updated: Option<DateTime<Utc>>,
}

impl ShowStub {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self { id, updated: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub name: Option<String>,
    /// ISO 3166-1 alpha-2 code, e.g. `"US"`.
    pub code: Option<String>,
    /// IANA timezone, e.g. `"America/New_York"`.
    pub timezone: Option<String>,
}

/// A broadcast network. Get-or-created by upstream ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: i64,
    pub name: String,
    pub country: Option<Country>,
    pub official_site: Option<String>,
}

/// A streaming service. Get-or-created by upstream ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebChannel {
    pub id: i64,
    pub name: String,
    pub country: Option<Country>,
    pub official_site: Option<String>,
}

/// Cross-references to other catalog databases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Externals {
    pub tvrage: Option<i64>,
    pub thetvdb: Option<i64>,
    /// IMDb title ID, e.g. `"tt0944947"`.
    pub imdb: Option<String>,
}

/// Full show record. Overwrites the stored row wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowDetail {
    pub id: i64,
    pub url: Option<String>,
    pub name: String,
    /// Upstream show type, e.g. `"Scripted"` or `"Reality"`.
    pub show_type: Option<String>,
    pub language: Option<String>,
    /// `"Running"`, `"Ended"`, `"To Be Determined"`, ...
    pub status: Option<String>,
    pub runtime: Option<i32>,
    pub average_runtime: Option<i32>,
    pub premiered: Option<NaiveDate>,
    pub ended: Option<NaiveDate>,
    pub official_site: Option<String>,
    /// Local airing time as `HH:MM`, empty upstream values become `None`.
    pub schedule_time: Option<String>,
    pub schedule_days: Vec<String>,
    pub rating: Option<f64>,
    pub weight: Option<i32>,
    pub network: Option<Network>,
    pub web_channel: Option<WebChannel>,
    pub externals: Externals,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    /// HTML summary exactly as the upstream returns it.
    pub summary: Option<String>,
    /// Upstream last-change time.
    pub updated: Option<DateTime<Utc>>,
    /// Raw genre names, not yet normalized.
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub url: Option<String>,
    pub number: Option<i32>,
    pub name: Option<String>,
    pub episode_order: Option<i32>,
    pub premiere_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub network: Option<Network>,
    pub web_channel: Option<WebChannel>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub url: Option<String>,
    pub name: Option<String>,
    /// Season *number* the upstream files this episode under.
    pub season_number: Option<i32>,
    /// Episode number within the season. Specials usually have none.
    pub number: Option<i32>,
    /// `"regular"`, `"significant_special"` or `"insignificant_special"`.
    pub episode_type: Option<String>,
    pub airdate: Option<NaiveDate>,
    pub airtime: Option<String>,
    pub airstamp: Option<DateTime<Utc>>,
    pub runtime: Option<i32>,
    pub rating: Option<f64>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub summary: Option<String>,
}

impl Episode {
    /// Returns `true` when the upstream marks this episode as a special.
    ///
    /// An episode without a number is treated as a special even when the
    /// type field is missing.
    #[must_use]
    pub fn is_special(&self) -> bool {
        match self.episode_type.as_deref() {
            Some(kind) => kind.ends_with("special"),
            None => self.number.is_none(),
        }
    }
}

/// Trim a genre name and collapse internal whitespace.
///
/// Returns `None` for names that are blank after trimming.
#[must_use]
pub fn normalize_genre_name(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Case-insensitive uniqueness key for a normalized genre name.
#[must_use]
pub fn genre_key(name: &str) -> String {
    name.to_lowercase()
}
