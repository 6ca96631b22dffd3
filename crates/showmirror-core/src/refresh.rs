//! A validated, self-consistent snapshot of one show, ready to be applied
//! to the store in a single transaction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{genre_key, normalize_genre_name, Episode, Season, ShowDetail};

/// Reasons an upstream payload cannot be turned into a [`ShowRefresh`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("detail for show {expected} came back with id {actual}")]
    ShowIdMismatch { expected: i64, actual: i64 },

    #[error("show {show_id} has an empty name")]
    EmptyName { show_id: i64 },

    #[error("show {show_id} lists season number {number} more than once")]
    DuplicateSeasonNumber { show_id: i64, number: i32 },

    #[error(
        "episode {episode_id} of show {show_id} references season {season_number}, \
         which is not in the season list"
    )]
    UnknownSeason {
        show_id: i64,
        episode_id: i64,
        season_number: i32,
    },
}

/// An episode with its parent season already resolved to an upstream ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEpisode {
    pub episode: Episode,
    /// `None` only for specials the season list does not cover.
    pub season_id: Option<i64>,
}

/// Everything needed to replace one show's mirrored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRefresh {
    pub show: ShowDetail,
    /// Normalized, case-insensitively unique genre names in upstream order.
    pub genres: Vec<String>,
    pub seasons: Vec<Season>,
    pub episodes: Vec<PlacedEpisode>,
}

impl ShowRefresh {
    /// Validate fetched payloads for `expected_id` and resolve each episode's
    /// season number against `seasons`.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] when the detail belongs to another show, the
    /// name is blank, season numbers repeat, or a non-special episode names a
    /// season that was not fetched.
    pub fn assemble(
        expected_id: i64,
        show: ShowDetail,
        seasons: Vec<Season>,
        episodes: Vec<Episode>,
    ) -> Result<Self, RefreshError> {
        if show.id != expected_id {
            return Err(RefreshError::ShowIdMismatch {
                expected: expected_id,
                actual: show.id,
            });
        }
        if show.name.trim().is_empty() {
            return Err(RefreshError::EmptyName { show_id: show.id });
        }

        let mut season_ids: HashMap<i32, i64> = HashMap::with_capacity(seasons.len());
        for season in &seasons {
            if let Some(number) = season.number {
                if season_ids.insert(number, season.id).is_some() {
                    return Err(RefreshError::DuplicateSeasonNumber {
                        show_id: show.id,
                        number,
                    });
                }
            }
        }

        let mut placed = Vec::with_capacity(episodes.len());
        for episode in episodes {
            let season_id = match episode.season_number {
                None => None,
                Some(number) => match season_ids.get(&number) {
                    Some(id) => Some(*id),
                    None if episode.is_special() => None,
                    None => {
                        return Err(RefreshError::UnknownSeason {
                            show_id: show.id,
                            episode_id: episode.id,
                            season_number: number,
                        })
                    }
                },
            };
            placed.push(PlacedEpisode { episode, season_id });
        }

        let genres = dedupe_genres(&show.genres);

        Ok(Self {
            show,
            genres,
            seasons,
            episodes: placed,
        })
    }

    #[must_use]
    pub fn show_id(&self) -> i64 {
        self.show.id
    }
}

fn dedupe_genres(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|name| normalize_genre_name(name))
        .filter(|name| seen.insert(genre_key(name)))
        .collect()
}

/// Row-level effect of applying one [`ShowRefresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// `true` when the show row was inserted or any column changed.
    pub show_changed: bool,
    /// Networks and web channels inserted or changed.
    pub channels_written: usize,
    pub genres_linked: usize,
    pub genres_unlinked: usize,
    pub seasons_written: usize,
    pub seasons_removed: usize,
    pub episodes_written: usize,
    pub episodes_removed: usize,
}

impl RefreshStats {
    /// `true` when applying the refresh touched no rows at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
