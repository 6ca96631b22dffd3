use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between request starts.
///
/// One pacer is shared by every clone of a client, so concurrent show
/// workers queue behind each other instead of bursting.
#[derive(Debug)]
pub(super) struct RequestPacer {
    gap: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub(super) fn new(gap: Duration) -> Self {
        Self {
            gap,
            last_start: Mutex::new(None),
        }
    }

    pub(super) fn gap(&self) -> Duration {
        self.gap
    }

    /// Waits until `gap` has passed since the previous request started.
    ///
    /// The lock is held across the sleep so waiters are released one gap
    /// apart, in arrival order.
    pub(super) async fn wait_turn(&self) {
        if self.gap.is_zero() {
            return;
        }
        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            tokio::time::sleep_until(previous + self.gap).await;
        }
        *last_start = Some(Instant::now());
    }
}
