use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::error::FetchError;

fn rate_limited(secs: u64) -> FetchError {
    FetchError::Transient {
        message: "429 Too Many Requests".to_string(),
        retry_after: Some(Duration::from_secs(secs)),
    }
}

#[test]
fn delay_grows_geometrically() {
    let policy = RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(125),
        backoff_factor: 2.0,
        max_delay: None,
    };
    assert_eq!(policy.delay_for(1), Duration::from_millis(125));
    assert_eq!(policy.delay_for(2), Duration::from_millis(250));
    assert_eq!(policy.delay_for(3), Duration::from_millis(500));
}

#[test]
fn delay_is_capped() {
    let policy = RetryPolicy {
        max_retries: 10,
        base_delay: Duration::from_secs(1),
        backoff_factor: 2.0,
        max_delay: Some(Duration::from_secs(5)),
    };
    assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    assert_eq!(policy.delay_for(4), Duration::from_secs(5));
    assert_eq!(policy.delay_for(40), Duration::from_secs(5));
}

#[test]
fn policy_reads_app_config() {
    let config = showmirror_core::AppConfig {
        database_url: "postgres://example".to_string(),
        env: showmirror_core::Environment::Test,
        bind_addr: "127.0.0.1:3000".parse().unwrap(),
        log_level: "info".to_string(),
        db_max_connections: 10,
        db_min_connections: 1,
        db_acquire_timeout_secs: 10,
        catalog_base_url: "https://api.tvmaze.com".to_string(),
        catalog_user_agent: "ua".to_string(),
        catalog_request_timeout_secs: 30,
        catalog_request_delay_ms: 250,
        max_retries: 4,
        retry_base_delay_ms: 250,
        retry_backoff_factor: 2.0,
        retry_max_delay_ms: 1_000,
        max_concurrent_shows: 8,
        update_schedule: "0 0 5 * * *".to_string(),
    };
    let policy = RetryPolicy::from_app_config(&config);
    assert_eq!(policy.max_retries, 4);
    assert_eq!(policy.delay_for(2), Duration::from_millis(500));
    assert_eq!(policy.delay_for(4), Duration::from_secs(1));
}

#[tokio::test]
async fn retries_transient_errors_then_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let result = RetryPolicy::immediate(3)
        .execute("test", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::transient("503"))
                } else {
                    Ok::<u32, FetchError>(99)
                }
            }
        })
        .await;
    assert_eq!(result.unwrap(), 99);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausting_retries_keeps_the_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let result = RetryPolicy::immediate(2)
        .execute("test", || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(FetchError::transient(format!("attempt {n}")))
            }
        })
        .await;
    // max_retries=2 → 3 total attempts
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result {
        Err(RetryError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last.to_string(), "attempt 2");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let result = RetryPolicy::immediate(3)
        .execute("test", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(FetchError::NotFound {
                    message: "/shows/1".to_string(),
                })
            }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        result,
        Err(RetryError::Fatal(FetchError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn zero_retries_fails_on_first_transient_error() {
    let result = RetryPolicy::immediate(0)
        .execute("test", || async {
            Err::<u32, FetchError>(FetchError::transient("timeout"))
        })
        .await;
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
}

#[tokio::test]
async fn retry_after_extends_the_delay_up_to_the_cap() {
    let policy = RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(10),
        backoff_factor: 2.0,
        max_delay: Some(Duration::from_millis(50)),
    };
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let started = std::time::Instant::now();
    let result = policy
        .execute("test", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(rate_limited(120))
                } else {
                    Ok::<(), FetchError>(())
                }
            }
        })
        .await;
    assert!(result.is_ok());
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(50), "waited {waited:?}");
    assert!(waited < Duration::from_secs(5), "waited {waited:?}");
}
