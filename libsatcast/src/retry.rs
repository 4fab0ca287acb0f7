//! Bounded retry with exponential backoff
//!
//! Transient failures are retried after `delay * 2^(attempt-1)`, where the
//! delay depends on whether the remote rate-limited us. Rate-limit failures
//! are fed to the platform's circuit breaker, and tripping it ends the loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{PlatformError, PlatformResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            DEFAULT_RATE_LIMIT_DELAY,
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, rate_limit_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            rate_limit_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the attempt following `attempt` (1-based)
    pub fn delay_for(&self, error: &PlatformError, attempt: u32) -> Duration {
        let base = if error.is_rate_limited() {
            self.rate_limit_delay
        } else {
            self.base_delay
        };
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out
    ///
    /// The closure receives the 1-based attempt number. An open breaker is
    /// checked before every attempt so a tripped platform is never called.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, the first
    /// non-transient error, or `PlatformError::CircuitOpen` when the breaker
    /// is (or becomes) open.
    pub async fn run<T, F, Fut>(
        &self,
        platform: &str,
        breaker: &CircuitBreaker,
        mut operation: F,
    ) -> PlatformResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let mut attempt = 1;
        loop {
            if let Some(remaining) = breaker.remaining_cooldown() {
                return Err(PlatformError::CircuitOpen { remaining });
            }

            let error = match operation(attempt).await {
                Ok(value) => {
                    breaker.record_success();
                    if attempt > 1 {
                        debug!(platform, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.counts_toward_breaker() && breaker.record_failure() {
                warn!(platform, attempt, "Rate limited, circuit breaker tripped");
                return Err(PlatformError::CircuitOpen {
                    remaining: breaker.remaining_cooldown().unwrap_or(breaker.cooldown()),
                });
            }

            if !error.is_transient() {
                debug!(platform, attempt, error = %error, "Permanent error, not retrying");
                return Err(error);
            }

            if attempt >= self.max_attempts {
                warn!(
                    platform,
                    attempts = self.max_attempts,
                    error = %error,
                    "Giving up after retries"
                );
                return Err(error);
            }

            let delay = self.delay_for(&error, attempt);
            warn!(
                platform,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient error, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
