//! Reliable posting to a single platform
//!
//! [`PostingClient`] owns one platform's rate limiter and circuit breaker and
//! runs every post through the retry policy. It never returns an error: all
//! failures end up in the [`PostResult`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{CircuitBreaker, DEFAULT_COOLDOWN, DEFAULT_THRESHOLD};
use crate::error::{PlatformError, PlatformResult};
use crate::platforms::{MediaRef, Platform};
use crate::rate_limiter::RateLimiter;
use crate::retry::{
    RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_DELAY,
};
use crate::types::{PostReceipt, PostRequest, PostResult};

/// Minimum spacing between two posts on one platform
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(65_000);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning shared by every posting client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingSettings {
    pub min_interval: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for PostingSettings {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            breaker_threshold: DEFAULT_THRESHOLD,
            breaker_cooldown: DEFAULT_COOLDOWN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct PostingClient {
    platform: Arc<dyn Platform>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl PostingClient {
    pub fn new(platform: Arc<dyn Platform>, settings: &PostingSettings) -> Self {
        Self {
            platform,
            limiter: RateLimiter::new(settings.min_interval),
            breaker: CircuitBreaker::new(settings.breaker_threshold, settings.breaker_cooldown),
            retry: RetryPolicy::new(
                settings.max_attempts,
                settings.base_delay,
                settings.rate_limit_delay,
            ),
            request_timeout: settings.request_timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.platform.name()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Post `request` and report the outcome
    pub async fn post(&self, request: &PostRequest) -> PostResult {
        let platform = self.name();
        info!(platform, request_id = %request.id, "Posting");

        match self.try_post(request).await {
            Ok(receipt) => {
                info!(platform, post_id = %receipt.id, "Posted");
                PostResult::posted(platform, receipt)
            }
            Err(e) => {
                warn!(platform, error = %e, "Post failed");
                PostResult::failed(platform, &e)
            }
        }
    }

    async fn try_post(&self, request: &PostRequest) -> PlatformResult<PostReceipt> {
        let platform = self.name();

        if let Some(remaining) = self.breaker.remaining_cooldown() {
            return Err(PlatformError::CircuitOpen { remaining });
        }

        let media = self.upload_media(request).await?;
        let media = media.as_slice();
        let text = request.text.as_str();

        self.retry
            .run(platform, &self.breaker, |attempt| async move {
                self.limiter.acquire().await;
                debug!(platform, attempt, "Sending post");
                self.timed(self.platform.post(text, media)).await
            })
            .await
    }

    async fn upload_media(&self, request: &PostRequest) -> PlatformResult<Vec<MediaRef>> {
        if !request.has_media() {
            return Ok(Vec::new());
        }
        if !self.platform.supports_media() {
            debug!(
                platform = self.name(),
                "Platform has no media support, posting text only"
            );
            return Ok(Vec::new());
        }

        let mut uploaded = Vec::with_capacity(request.media.len());
        for item in &request.media {
            let media = self
                .retry
                .run(self.name(), &self.breaker, |_| {
                    self.timed(self.platform.upload_media(item))
                })
                .await?;
            uploaded.push(media);
        }
        Ok(uploaded)
    }

    async fn timed<T>(
        &self,
        call: impl std::future::Future<Output = PlatformResult<T>>,
    ) -> PlatformResult<T> {
        match timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Network(format!(
                "Request timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }
}
