//! Cross-process exclusion for ingest runs via a Postgres advisory lock.

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use crate::DbError;

/// Advisory lock key shared by every process that mirrors into this database.
pub const RUN_LOCK_KEY: i64 = 0x5348_4f57_4d49_5252;

/// A held run lock, pinned to the session that took it.
///
/// Call [`RunLock::release`] when the run is over. Dropping the guard without
/// releasing closes its connection instead, which also frees the lock.
pub struct RunLock {
    conn: Option<PoolConnection<Postgres>>,
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("held", &self.conn.is_some())
            .finish()
    }
}

/// Takes the run lock if no other session holds it.
///
/// Returns `None` when another run (in this or any other process) has it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a connection cannot be acquired or the lock
/// query fails.
pub async fn try_acquire_run_lock(pool: &PgPool) -> Result<Option<RunLock>, DbError> {
    let mut conn = pool.acquire().await?;
    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(RUN_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await?;

    if acquired {
        Ok(Some(RunLock { conn: Some(conn) }))
    } else {
        Ok(None)
    }
}

impl RunLock {
    /// Releases the lock and hands the connection back to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the unlock query fails; the connection is
    /// then closed so the lock does not outlive the guard.
    pub async fn release(mut self) -> Result<(), DbError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await;
        match unlocked {
            Ok(_) => Ok(()),
            Err(err) => {
                drop(conn.detach());
                Err(err.into())
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("run lock dropped without release; closing its connection");
            drop(conn.detach());
        }
    }
}
