//! Offline unit tests for showmirror-db pool configuration and row types.
//! These tests do not require a live database connection.

use showmirror_core::{AppConfig, Environment};
use showmirror_db::{IngestRunRow, IngestRunStatus, PoolConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        catalog_base_url: "https://api.tvmaze.com".to_string(),
        catalog_user_agent: "ua".to_string(),
        catalog_request_timeout_secs: 30,
        catalog_request_delay_ms: 250,
        max_retries: 3,
        retry_base_delay_ms: 1000,
        retry_backoff_factor: 2.0,
        retry_max_delay_ms: 60_000,
        max_concurrent_shows: 10,
        update_schedule: "0 0 5 * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`IngestRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn ingest_run_row_serializes_for_api_responses() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = IngestRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        mode: "full".to_string(),
        trigger_source: "cli".to_string(),
        status: IngestRunStatus::Succeeded.to_string(),
        started_at: Some(Utc::now()),
        completed_at: None,
        shows_attempted: 4,
        shows_succeeded: 4,
        shows_failed: 0,
        watermark_advanced: true,
        error_message: None,
        created_at: Utc::now(),
    };

    let value = serde_json::to_value(&row).expect("serialize failed");
    assert_eq!(value["status"], "succeeded");
    assert_eq!(value["shows_attempted"], 4);
    assert_eq!(value["watermark_advanced"], true);
}
