//! Mock platform implementation for testing
//!
//! This module provides a configurable mock platform that can simulate various
//! behaviors including successes, scripted failures, and delays. It's designed
//! for use in integration tests to verify the posting client and orchestrator
//! without platform credentials or network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::error::{PlatformError, PlatformResult};
use crate::platforms::{MediaRef, Platform};
use crate::types::{MediaItem, PostReceipt};

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "twitter", "bluesky")
    pub name: String,

    /// Error returned by every post once the script is exhausted
    pub post_error: Option<PlatformError>,

    /// Errors returned by the first posts, in order
    pub scripted_errors: Vec<PlatformError>,

    /// Error returned by every media upload
    pub upload_error: Option<PlatformError>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    pub supports_media: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            post_error: None,
            scripted_errors: Vec::new(),
            upload_error: None,
            delay: Duration::ZERO,
            supports_media: true,
        }
    }
}

/// A post the mock accepted
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub text: String,
    pub media_ids: Vec<String>,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<PlatformError>,
    post_calls: usize,
    upload_calls: usize,
    post_started_at: Vec<Instant>,
    posted: Vec<RecordedPost>,
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        let state = MockState {
            script: config.scripted_errors.iter().cloned().collect(),
            ..Default::default()
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Create a mock platform that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock platform whose every post fails with `error`
    pub fn failing(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock platform that fails with `errors` first, then succeeds
    pub fn scripted(name: &str, errors: Vec<PlatformError>) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            scripted_errors: errors,
            ..Default::default()
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Create a shared handle, for keeping call counts after handing it to a client
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the number of times post was called
    pub fn post_call_count(&self) -> usize {
        self.state().post_calls
    }

    /// Get the number of times upload_media was called
    pub fn upload_call_count(&self) -> usize {
        self.state().upload_calls
    }

    /// When each post call started, in call order
    pub fn post_times(&self) -> Vec<Instant> {
        self.state().post_started_at.clone()
    }

    /// Get all posts that succeeded
    pub fn posted(&self) -> Vec<RecordedPost> {
        self.state().posted.clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supports_media(&self) -> bool {
        self.config.supports_media
    }

    async fn upload_media(&self, media: &MediaItem) -> PlatformResult<MediaRef> {
        let call = {
            let mut state = self.state();
            state.upload_calls += 1;
            state.upload_calls
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.upload_error {
            Some(error) => Err(error.clone()),
            None => Ok(MediaRef::new(
                format!("{}:media-{}", self.config.name, call),
                &media.alt_text,
            )),
        }
    }

    async fn post(&self, text: &str, media: &[MediaRef]) -> PlatformResult<PostReceipt> {
        let scripted = {
            let mut state = self.state();
            state.post_calls += 1;
            state.post_started_at.push(Instant::now());
            state.script.pop_front()
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = scripted.or_else(|| self.config.post_error.clone()) {
            return Err(error);
        }

        self.state().posted.push(RecordedPost {
            text: text.to_string(),
            media_ids: media.iter().map(|m| m.id.clone()).collect(),
        });

        let post_id = format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4());
        Ok(PostReceipt::new(post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageMimeType;

    #[tokio::test]
    async fn test_mock_success() {
        let platform = MockPlatform::success("test");
        assert_eq!(platform.name(), "test");

        let receipt = platform.post("Test content", &[]).await.unwrap();
        assert!(receipt.id.starts_with("test:mock-"));
        assert_eq!(platform.post_call_count(), 1);

        let posted = platform.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].text, "Test content");
    }

    #[tokio::test]
    async fn test_mock_post_failure() {
        let platform = MockPlatform::failing("test", PlatformError::Network("reset".into()));

        let result = platform.post("Test content", &[]).await;
        assert_eq!(result, Err(PlatformError::Network("reset".into())));
        assert_eq!(platform.post_call_count(), 1);
        assert!(platform.posted().is_empty());
    }

    #[tokio::test]
    async fn test_mock_script_runs_out() {
        let platform = MockPlatform::scripted(
            "test",
            vec![
                PlatformError::RateLimit("429".into()),
                PlatformError::Network("reset".into()),
            ],
        );

        assert!(platform.post("a", &[]).await.is_err());
        assert!(platform.post("a", &[]).await.is_err());
        assert!(platform.post("a", &[]).await.is_ok());
        assert_eq!(platform.post_call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_media_ids_recorded() {
        let platform = MockPlatform::success("test");
        let item = MediaItem::new(vec![0u8; 4], ImageMimeType::Png, "Chart");

        let media = platform.upload_media(&item).await.unwrap();
        assert_eq!(media.alt_text, "Chart");
        platform.post("with image", &[media.clone()]).await.unwrap();

        assert_eq!(platform.upload_call_count(), 1);
        assert_eq!(platform.posted()[0].media_ids, vec![media.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_with_delay() {
        let platform = MockPlatform::with_delay("test", Duration::from_millis(50));

        let start = Instant::now();
        platform.post("Test", &[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
