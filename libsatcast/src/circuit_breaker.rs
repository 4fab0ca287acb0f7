//! Circuit breaker for platform posting
//!
//! Trips after a run of rate-limit failures and rejects attempts until a
//! cooldown, measured from the moment it opened, has passed. There is no
//! half-open probe: the first check after the cooldown closes it.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Consecutive rate-limit failures that open the breaker
pub const DEFAULT_THRESHOLD: u32 = 3;

/// How long an open breaker rejects attempts
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Snapshot of a breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub is_open: bool,
    pub opened_at: Option<Instant>,
    pub consecutive_failures: u32,
}

impl CircuitBreakerState {
    fn closed() -> Self {
        Self {
            is_open: false,
            opened_at: None,
            consecutive_failures: 0,
        }
    }
}

pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<CircuitBreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(CircuitBreakerState::closed()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remaining cooldown if the breaker is open, `None` if attempts may proceed
    ///
    /// An open breaker whose cooldown has elapsed is closed here, and its
    /// failure counter reset.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let mut state = self.lock();
        if !state.is_open {
            return None;
        }

        let opened_at = state.opened_at.unwrap_or_else(Instant::now);
        let elapsed = Instant::now().saturating_duration_since(opened_at);
        if elapsed >= self.cooldown {
            info!(
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker cooldown elapsed, closing"
            );
            *state = CircuitBreakerState::closed();
            None
        } else {
            Some(self.cooldown - elapsed)
        }
    }

    pub fn is_open(&self) -> bool {
        self.remaining_cooldown().is_some()
    }

    /// Count a rate-limit failure; returns true if the breaker is now open
    pub fn record_failure(&self) -> bool {
        let mut state = self.lock();
        state.consecutive_failures += 1;

        if !state.is_open && state.consecutive_failures >= self.threshold {
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker opening"
            );
            state.is_open = true;
            state.opened_at = Some(Instant::now());
        }

        state.is_open
    }

    /// Reset the failure counter. Does not close an open breaker.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn state(&self) -> CircuitBreakerState {
        *self.lock()
    }
}
