//! Live integration tests for showmirror-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/showmirror-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, TimeZone, Utc};
use showmirror_core::{
    Country, Episode, Externals, Network, Season, ShowDetail, ShowRefresh, WebChannel,
};
use showmirror_db::{
    abandon_unfinished_ingest_runs, count_shows, create_ingest_run, fail_ingest_run,
    finish_ingest_run, get_ingest_run, get_ingest_run_by_public_id, get_network, get_show,
    get_watermark, insert_ingest_run_failures, list_episodes, list_ingest_run_failures,
    list_ingest_runs, list_seasons, list_show_genres, refresh_show, set_watermark,
    start_ingest_run, try_acquire_run_lock, DbError, IngestRunStatus, IngestRunSummary,
    NewIngestRunFailure,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hbo() -> Network {
    Network {
        id: 8,
        name: "HBO".to_string(),
        country: Some(Country {
            name: Some("United States".to_string()),
            code: Some("US".to_string()),
            timezone: Some("America/New_York".to_string()),
        }),
        official_site: None,
    }
}

fn make_show(id: i64, genres: &[&str]) -> ShowDetail {
    ShowDetail {
        id,
        url: Some(format!("https://www.tvmaze.com/shows/{id}")),
        name: format!("Show {id}"),
        show_type: Some("Scripted".to_string()),
        language: Some("English".to_string()),
        status: Some("Running".to_string()),
        runtime: Some(60),
        average_runtime: Some(60),
        premiered: chrono::NaiveDate::from_ymd_opt(2020, 1, 5),
        ended: None,
        official_site: None,
        schedule_time: Some("21:00".to_string()),
        schedule_days: vec!["Sunday".to_string()],
        rating: Some(8.1),
        weight: Some(90),
        network: Some(hbo()),
        web_channel: None,
        externals: Externals {
            tvrage: None,
            thetvdb: Some(1000 + id),
            imdb: Some(format!("tt{id:07}")),
        },
        image_medium: None,
        image_original: None,
        summary: Some("<p>Summary</p>".to_string()),
        updated: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        genres: genres.iter().map(|g| (*g).to_string()).collect(),
    }
}

fn make_season(id: i64, number: i32) -> Season {
    Season {
        id,
        url: None,
        number: Some(number),
        name: None,
        episode_order: Some(2),
        premiere_date: None,
        end_date: None,
        network: Some(hbo()),
        web_channel: None,
        image_medium: None,
        image_original: None,
        summary: None,
    }
}

fn make_episode(id: i64, season_number: i32, number: Option<i32>, kind: &str) -> Episode {
    Episode {
        id,
        url: None,
        name: Some(format!("Episode {id}")),
        season_number: Some(season_number),
        number,
        episode_type: Some(kind.to_string()),
        airdate: None,
        airtime: None,
        airstamp: None,
        runtime: Some(60),
        rating: None,
        image_medium: None,
        image_original: None,
        summary: None,
    }
}

/// Show with seasons 1 and 2, two episodes each.
fn two_season_refresh(show_id: i64) -> ShowRefresh {
    ShowRefresh::assemble(
        show_id,
        make_show(show_id, &["Drama", "Fantasy"]),
        vec![make_season(show_id * 10 + 1, 1), make_season(show_id * 10 + 2, 2)],
        vec![
            make_episode(show_id * 100 + 1, 1, Some(1), "regular"),
            make_episode(show_id * 100 + 2, 1, Some(2), "regular"),
            make_episode(show_id * 100 + 3, 2, Some(1), "regular"),
            make_episode(show_id * 100 + 4, 2, Some(2), "regular"),
        ],
    )
    .expect("assemble failed")
}

// ---------------------------------------------------------------------------
// Section 1: Show refresh
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_writes_every_entity(pool: sqlx::PgPool) {
    let stats = refresh_show(&pool, &two_season_refresh(1))
        .await
        .expect("refresh_show failed");

    assert!(stats.show_changed);
    assert_eq!(stats.genres_linked, 2);
    assert_eq!(stats.seasons_written, 2);
    assert_eq!(stats.episodes_written, 4);

    let show = get_show(&pool, 1).await.expect("get_show failed");
    assert_eq!(show.name, "Show 1");
    assert_eq!(show.network_id, Some(8));
    assert_eq!(show.schedule_days, vec!["Sunday"]);

    let network = get_network(&pool, 8).await.expect("get_network failed");
    assert_eq!(network.country_code.as_deref(), Some("US"));

    assert_eq!(
        list_show_genres(&pool, 1).await.unwrap(),
        vec!["Drama", "Fantasy"]
    );
    assert_eq!(list_seasons(&pool, 1).await.unwrap().len(), 2);

    let episodes = list_episodes(&pool, 1).await.unwrap();
    assert_eq!(episodes.len(), 4);
    assert_eq!(episodes[2].season_id, Some(12));
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_is_idempotent(pool: sqlx::PgPool) {
    let refresh = two_season_refresh(1);
    refresh_show(&pool, &refresh).await.expect("first refresh failed");
    let before = get_show(&pool, 1).await.unwrap();

    let stats = refresh_show(&pool, &refresh)
        .await
        .expect("second refresh failed");
    assert!(stats.is_noop(), "identical payload changed rows: {stats:?}");

    let after = get_show(&pool, 1).await.unwrap();
    assert_eq!(before.updated_at, after.updated_at);
    assert_eq!(list_show_genres(&pool, 1).await.unwrap().len(), 2);
    assert_eq!(list_episodes(&pool, 1).await.unwrap().len(), 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn renamed_network_alone_is_not_a_noop(pool: sqlx::PgPool) {
    let first = refresh_show(&pool, &two_season_refresh(1))
        .await
        .expect("first refresh failed");
    assert_eq!(first.channels_written, 1);

    let mut renamed = two_season_refresh(1);
    if let Some(network) = renamed.show.network.as_mut() {
        network.name = "HBO Max".to_string();
    }
    let stats = refresh_show(&pool, &renamed)
        .await
        .expect("second refresh failed");

    assert!(!stats.show_changed);
    assert_eq!(stats.channels_written, 1);
    assert!(!stats.is_noop(), "network rename was reported as a no-op");
    assert_eq!(get_network(&pool, 8).await.unwrap().name, "HBO Max");

    let again = refresh_show(&pool, &renamed)
        .await
        .expect("third refresh failed");
    assert!(again.is_noop(), "identical payload changed rows: {again:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_removes_dropped_season_and_its_episodes(pool: sqlx::PgPool) {
    refresh_show(&pool, &two_season_refresh(1)).await.unwrap();

    let only_first = ShowRefresh::assemble(
        1,
        make_show(1, &["Drama", "Fantasy"]),
        vec![make_season(11, 1)],
        vec![
            make_episode(101, 1, Some(1), "regular"),
            make_episode(102, 1, Some(2), "regular"),
        ],
    )
    .unwrap();
    let stats = refresh_show(&pool, &only_first).await.unwrap();

    assert_eq!(stats.seasons_removed, 1);
    assert_eq!(stats.episodes_removed, 2);
    let seasons = list_seasons(&pool, 1).await.unwrap();
    assert_eq!(seasons.iter().map(|s| s.id).collect::<Vec<_>>(), vec![11]);
    assert_eq!(list_episodes(&pool, 1).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_replaces_genre_set(pool: sqlx::PgPool) {
    refresh_show(&pool, &two_season_refresh(1)).await.unwrap();

    let regenred =
        ShowRefresh::assemble(1, make_show(1, &["drama", "Thriller"]), vec![], vec![]).unwrap();
    let stats = refresh_show(&pool, &regenred).await.unwrap();

    assert_eq!(stats.genres_linked, 1);
    assert_eq!(stats.genres_unlinked, 1);
    // "drama" reuses the existing "Drama" row.
    assert_eq!(
        list_show_genres(&pool, 1).await.unwrap(),
        vec!["Drama", "Thriller"]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_stores_unplaced_special_with_null_season(pool: sqlx::PgPool) {
    let refresh = ShowRefresh::assemble(
        2,
        make_show(2, &[]),
        vec![make_season(21, 1)],
        vec![
            make_episode(201, 1, Some(1), "regular"),
            make_episode(202, 0, None, "significant_special"),
        ],
    )
    .unwrap();
    refresh_show(&pool, &refresh).await.unwrap();

    let episodes = list_episodes(&pool, 2).await.unwrap();
    let special = episodes.iter().find(|e| e.id == 202).unwrap();
    assert!(special.season_id.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_show_with_web_channel(pool: sqlx::PgPool) {
    let mut show = make_show(3, &[]);
    show.network = None;
    show.web_channel = Some(WebChannel {
        id: 1,
        name: "Netflix".to_string(),
        country: None,
        official_site: Some("https://www.netflix.com/".to_string()),
    });
    let refresh = ShowRefresh::assemble(3, show, vec![], vec![]).unwrap();
    refresh_show(&pool, &refresh).await.unwrap();

    let row = get_show(&pool, 3).await.unwrap();
    assert_eq!(row.web_channel_id, Some(1));
    assert!(row.network_id.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_refresh_leaves_previous_rows(pool: sqlx::PgPool) {
    refresh_show(&pool, &two_season_refresh(1)).await.unwrap();

    // The blank name violates the CHECK constraint after channels were written.
    let mut broken = two_season_refresh(4);
    broken.show.name = " ".to_string();
    let err = refresh_show(&pool, &broken).await;
    assert!(matches!(err, Err(DbError::Sqlx(_))), "got: {err:?}");

    assert!(matches!(get_show(&pool, 4).await, Err(DbError::NotFound)));
    assert!(list_seasons(&pool, 4).await.unwrap().is_empty());
    assert_eq!(count_shows(&pool).await.unwrap(), 1);
    assert_eq!(list_episodes(&pool, 1).await.unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// Section 2: Watermark
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn watermark_starts_empty_and_only_moves_forward(pool: sqlx::PgPool) {
    assert!(get_watermark(&pool).await.unwrap().is_none());

    let t1 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    assert_eq!(set_watermark(&pool, t1).await.unwrap(), t1);

    let earlier = t1 - Duration::hours(1);
    assert_eq!(set_watermark(&pool, earlier).await.unwrap(), t1);

    let later = t1 + Duration::hours(1);
    assert_eq!(set_watermark(&pool, later).await.unwrap(), later);
    assert_eq!(get_watermark(&pool).await.unwrap(), Some(later));
}

// ---------------------------------------------------------------------------
// Section 3: Ingest run ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_lifecycle_queued_to_partial(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "incremental", "schedule")
        .await
        .expect("create_ingest_run failed");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    start_ingest_run(&pool, run.id, Utc::now())
        .await
        .expect("start_ingest_run failed");

    insert_ingest_run_failures(
        &pool,
        run.id,
        &[NewIngestRunFailure {
            show_id: 123,
            failure_kind: "retry_exhausted".to_string(),
            message: "show 123: HTTP 503".to_string(),
        }],
    )
    .await
    .expect("insert_ingest_run_failures failed");

    finish_ingest_run(
        &pool,
        run.id,
        &IngestRunSummary {
            status: IngestRunStatus::Partial,
            shows_attempted: 3,
            shows_succeeded: 2,
            shows_failed: 1,
            watermark_advanced: true,
            error_message: None,
        },
    )
    .await
    .expect("finish_ingest_run failed");

    let fetched = get_ingest_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "partial");
    assert_eq!(fetched.shows_failed, 1);
    assert!(fetched.watermark_advanced);
    assert!(fetched.completed_at.is_some());

    let by_public = get_ingest_run_by_public_id(&pool, run.public_id)
        .await
        .unwrap();
    assert_eq!(by_public.id, run.id);

    let failures = list_ingest_run_failures(&pool, run.id).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].show_id, 123);
    assert_eq!(failures[0].failure_kind, "retry_exhausted");
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_cannot_finish_from_queued(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "full", "cli").await.unwrap();
    let err = finish_ingest_run(
        &pool,
        run.id,
        &IngestRunSummary {
            status: IngestRunStatus::Succeeded,
            shows_attempted: 0,
            shows_succeeded: 0,
            shows_failed: 0,
            watermark_advanced: false,
            error_message: None,
        },
    )
    .await
    .expect_err("finishing a queued run should fail");

    assert!(matches!(
        err,
        DbError::InvalidIngestRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_can_fail_from_queued(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "full", "api").await.unwrap();
    fail_ingest_run(&pool, run.id, "catalog unreachable")
        .await
        .expect("fail_ingest_run failed");

    let fetched = get_ingest_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("catalog unreachable"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn abandon_unfinished_ingest_runs_fails_stale_runs(pool: sqlx::PgPool) {
    let queued = create_ingest_run(&pool, "full", "cli").await.unwrap();
    let running = create_ingest_run(&pool, "incremental", "api").await.unwrap();
    start_ingest_run(&pool, running.id, Utc::now()).await.unwrap();

    let touched = abandon_unfinished_ingest_runs(&pool).await.unwrap();
    assert_eq!(touched, 2);

    for id in [queued.id, running.id] {
        assert_eq!(get_ingest_run(&pool, id).await.unwrap().status, "failed");
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_ingest_runs_is_newest_first(pool: sqlx::PgPool) {
    let first = create_ingest_run(&pool, "full", "cli").await.unwrap();
    let second = create_ingest_run(&pool, "incremental", "cli").await.unwrap();

    let runs = list_ingest_runs(&pool, 10).await.unwrap();
    assert_eq!(
        runs.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_rejects_unknown_mode(pool: sqlx::PgPool) {
    let err = create_ingest_run(&pool, "weekly", "cli").await;
    assert!(matches!(err, Err(DbError::Sqlx(_))));
}

// ---------------------------------------------------------------------------
// Section 4: Run lock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn run_lock_is_exclusive_until_released(pool: sqlx::PgPool) {
    let held = try_acquire_run_lock(&pool)
        .await
        .expect("lock query failed")
        .expect("lock should be free");

    let contender = try_acquire_run_lock(&pool).await.expect("lock query failed");
    assert!(contender.is_none(), "a second session must not get the lock");

    held.release().await.expect("release failed");

    let again = try_acquire_run_lock(&pool)
        .await
        .expect("lock query failed")
        .expect("lock should be free after release");
    again.release().await.expect("release failed");
}
