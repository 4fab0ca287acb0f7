//! Rate limiting for outbound posts
//!
//! Enforces a minimum spacing between send attempts on one platform. The slot
//! is stamped when the attempt starts, not when it completes, so a slow or
//! failing send still consumes the interval.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Rate limiter for a single platform
pub struct RateLimiter {
    min_interval: Duration,
    /// Held across the wait so concurrent callers are served one at a time
    last_send: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given minimum spacing
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a send is allowed, then claim the slot
    ///
    /// Never fails. Waiters are released in arrival order.
    pub async fn acquire(&self) {
        let mut last_send = self.last_send.lock().await;

        if let Some(last) = *last_send {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Waiting for rate limit slot"
                );
                sleep_until(ready_at).await;
            }
        }

        *last_send = Some(Instant::now());
    }

    /// When the last slot was claimed
    pub async fn last_send(&self) -> Option<Instant> {
        *self.last_send.lock().await
    }

    /// How long an `acquire` issued now would wait (ignoring queued callers)
    pub async fn time_until_ready(&self) -> Duration {
        match *self.last_send.lock().await {
            Some(last) => (last + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}
