//! Platform abstraction and implementations
//!
//! A [`Platform`] makes one attempt per method call. Pacing,
//! retries and the circuit breaker live in [`crate::client::PostingClient`],
//! which wraps every platform.
//!
//! # Examples
//!
//! ```no_run
//! use libsatcast::platforms::{bluesky::BlueskyPlatform, Platform};
//! use libsatcast::config::BlueskyConfig;
//!
//! # async fn example(config: &BlueskyConfig) -> libsatcast::error::PlatformResult<()> {
//! let platform = BlueskyPlatform::new(config, std::time::Duration::from_secs(30))?;
//! let receipt = platform.post("#Bitcoin is currently trading at: $47,300.00", &[]).await?;
//! println!("Posted {}", receipt.id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::{PlatformError, PlatformResult};
use crate::types::{MediaItem, PostReceipt};

pub mod bluesky;
pub mod disabled;
pub mod twitter;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Handle to media already uploaded to a platform
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    /// Platform media id (Twitter `media_id`, Bluesky blob CID)
    pub id: String,
    pub alt_text: String,
    /// Raw platform descriptor where the post call needs more than the id
    pub descriptor: Option<serde_json::Value>,
}

impl MediaRef {
    pub fn new(id: impl Into<String>, alt_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alt_text: alt_text.into(),
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: serde_json::Value) -> Self {
        self.descriptor = Some(descriptor);
        self
    }
}

/// Platform trait for unified social media platform interactions
#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase identifier used in results and logs ("twitter", "bluesky")
    fn name(&self) -> &str;

    /// Whether `upload_media` is implemented
    ///
    /// Platforms without media support receive text-only posts.
    fn supports_media(&self) -> bool {
        false
    }

    /// Upload one image and return a handle for `post`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotImplemented` unless the platform overrides it,
    /// otherwise the classified HTTP or transport failure.
    async fn upload_media(&self, _media: &MediaItem) -> PlatformResult<MediaRef> {
        Err(PlatformError::NotImplemented(format!(
            "{} does not support media",
            self.name()
        )))
    }

    /// Publish `text` with previously uploaded media
    ///
    /// # Errors
    ///
    /// - `PlatformError::RateLimit` when the remote answers 429
    /// - `PlatformError::Authentication` for rejected credentials
    /// - `PlatformError::Validation` when the content is refused
    /// - `PlatformError::Network` for transport failures and 5xx
    async fn post(&self, text: &str, media: &[MediaRef]) -> PlatformResult<PostReceipt>;
}

/// XRPC error codes that mean the session token is no longer usable
const EXPIRED_SESSION_CODES: &[&str] = &["ExpiredToken", "InvalidToken"];

/// Read a non-success response into a classified error
pub(crate) async fn error_from_response(response: reqwest::Response) -> PlatformError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_error(status, &body)
}

/// Classify an error body by status, except that an expired or invalid
/// session token is always `Authentication`
///
/// AT Protocol servers answer an expired access token with HTTP 400.
pub(crate) fn classify_error(status: u16, body: &str) -> PlatformError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    };
    let message = field("message")
        .or_else(|| field("detail"))
        .or_else(|| field("error"))
        .unwrap_or_else(|| body.to_string());

    match field("error") {
        Some(code) if EXPIRED_SESSION_CODES.contains(&code.as_str()) => {
            PlatformError::Authentication(format!("HTTP {}: {}: {}", status, code, message))
        }
        _ => PlatformError::from_status(status, message),
    }
}
