//! Conversion from TVMaze wire types to [`showmirror_core`] catalog types.
//!
//! Normalization never fails: unparseable dates and timestamps become `None`
//! and empty strings are treated as absent. Payload validation that decides
//! whether a show can be mirrored at all lives in
//! [`showmirror_core::ShowRefresh::assemble`].

use chrono::{DateTime, NaiveDate, Utc};
use showmirror_core::{
    Country, Episode, Externals, Network, Season, ShowDetail, ShowStub, WebChannel,
};

use crate::types::{
    IndexEntry, TvMazeChannel, TvMazeCountry, TvMazeEpisode, TvMazeImage, TvMazeSeason,
    TvMazeShow,
};

#[must_use]
pub fn normalize_stub(entry: &IndexEntry) -> ShowStub {
    ShowStub {
        id: entry.id,
        updated: entry.updated.and_then(epoch_to_utc),
    }
}

#[must_use]
pub fn normalize_show(show: TvMazeShow) -> ShowDetail {
    let (image_medium, image_original) = split_image(show.image);
    let schedule = show.schedule.unwrap_or_default();
    let externals = show.externals.unwrap_or_default();

    ShowDetail {
        id: show.id,
        url: non_empty(show.url),
        name: show.name.trim().to_string(),
        show_type: non_empty(show.show_type),
        language: non_empty(show.language),
        status: non_empty(show.status),
        runtime: show.runtime,
        average_runtime: show.average_runtime,
        premiered: parse_date(show.premiered.as_deref()),
        ended: parse_date(show.ended.as_deref()),
        official_site: non_empty(show.official_site),
        schedule_time: non_empty(schedule.time),
        schedule_days: schedule.days,
        rating: show.rating.and_then(|r| r.average),
        weight: show.weight,
        network: show.network.map(normalize_network),
        web_channel: show.web_channel.map(normalize_web_channel),
        externals: Externals {
            tvrage: externals.tvrage,
            thetvdb: externals.thetvdb,
            imdb: non_empty(externals.imdb),
        },
        image_medium,
        image_original,
        summary: non_empty(show.summary),
        updated: show.updated.and_then(epoch_to_utc),
        genres: show.genres,
    }
}

#[must_use]
pub fn normalize_season(season: TvMazeSeason) -> Season {
    let (image_medium, image_original) = split_image(season.image);
    Season {
        id: season.id,
        url: non_empty(season.url),
        number: season.number,
        name: non_empty(season.name),
        episode_order: season.episode_order,
        premiere_date: parse_date(season.premiere_date.as_deref()),
        end_date: parse_date(season.end_date.as_deref()),
        network: season.network.map(normalize_network),
        web_channel: season.web_channel.map(normalize_web_channel),
        image_medium,
        image_original,
        summary: non_empty(season.summary),
    }
}

#[must_use]
pub fn normalize_episode(episode: TvMazeEpisode) -> Episode {
    let (image_medium, image_original) = split_image(episode.image);
    Episode {
        id: episode.id,
        url: non_empty(episode.url),
        name: non_empty(episode.name),
        season_number: episode.season,
        number: episode.number,
        episode_type: non_empty(episode.episode_type),
        airdate: parse_date(episode.airdate.as_deref()),
        airtime: non_empty(episode.airtime),
        airstamp: episode
            .airstamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        runtime: episode.runtime,
        rating: episode.rating.and_then(|r| r.average),
        image_medium,
        image_original,
        summary: non_empty(episode.summary),
    }
}

fn normalize_network(channel: TvMazeChannel) -> Network {
    Network {
        id: channel.id,
        name: channel.name,
        country: channel.country.map(normalize_country),
        official_site: non_empty(channel.official_site),
    }
}

fn normalize_web_channel(channel: TvMazeChannel) -> WebChannel {
    WebChannel {
        id: channel.id,
        name: channel.name,
        country: channel.country.map(normalize_country),
        official_site: non_empty(channel.official_site),
    }
}

fn normalize_country(country: TvMazeCountry) -> Country {
    Country {
        name: non_empty(country.name),
        code: non_empty(country.code),
        timezone: non_empty(country.timezone),
    }
}

fn split_image(image: Option<TvMazeImage>) -> (Option<String>, Option<String>) {
    let image = image.unwrap_or_default();
    (non_empty(image.medium), non_empty(image.original))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub(crate) fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
