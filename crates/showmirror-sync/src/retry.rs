//! Exponential-backoff retry for catalog fetches.

use std::future::Future;
use std::time::Duration;

use showmirror_core::AppConfig;
use thiserror::Error;

/// Errors that know whether another attempt might succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;

    /// Minimum wait the server asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// A permanent failure; never retried.
    #[error(transparent)]
    Fatal(E),

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The underlying error of the final attempt.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Fatal(err) | RetryError::Exhausted { last: err, .. } => err,
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first; `0` disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            backoff_factor: config.retry_backoff_factor,
            max_delay: Some(Duration::from_millis(config.retry_max_delay_ms)),
        }
    }

    /// A policy that retries immediately; handy for tests.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: None,
        }
    }

    /// Delay before retry `retry` (1-indexed): `base * factor^(retry - 1)`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        self.cap(delay)
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out of
    /// retries.
    ///
    /// A transient error carrying [`Retryable::retry_after`] waits at least
    /// that long before the next attempt, still bounded by `max_delay`.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Fatal`] on the first non-transient error, or
    /// [`RetryError::Exhausted`] with the last error once all retries fail.
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Retryable + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(RetryError::Fatal(err)),
                Err(err) if retry >= self.max_retries => {
                    return Err(RetryError::Exhausted {
                        attempts: retry + 1,
                        last: err,
                    });
                }
                Err(err) => {
                    retry += 1;
                    let mut delay = self.delay_for(retry);
                    if let Some(wait) = err.retry_after() {
                        delay = self.cap(delay.max(wait));
                    }
                    tracing::warn!(
                        operation,
                        attempt = retry,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient catalog error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
