//! Core types for Satcast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlatformError;

/// Content for one task invocation, posted identically to every platform.
#[derive(Debug, Clone)]
pub struct PostRequest {
    /// Correlation id for logs
    pub id: String,
    pub text: String,
    pub media: Vec<MediaItem>,
}

impl PostRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(mut self, item: MediaItem) -> Self {
        self.media.push(item);
        self
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// An image attached to a post
#[derive(Clone)]
pub struct MediaItem {
    pub bytes: Vec<u8>,
    pub mime_type: ImageMimeType,
    pub alt_text: String,
}

impl MediaItem {
    pub fn new(bytes: Vec<u8>, mime_type: ImageMimeType, alt_text: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type,
            alt_text: alt_text.into(),
        }
    }
}

impl std::fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaItem")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("alt_text", &self.alt_text)
            .finish()
    }
}

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a platform hands back for a published post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostReceipt {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl PostReceipt {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// Result of posting to a single platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostResult {
    /// Platform name (e.g., "twitter", "bluesky")
    pub platform: String,
    pub success: bool,
    /// Platform response (if successful)
    pub data: Option<PostReceipt>,
    /// Error message (if failed)
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rate_limited: Option<bool>,
}

impl PostResult {
    pub fn posted(platform: impl Into<String>, receipt: PostReceipt) -> Self {
        Self {
            platform: platform.into(),
            success: true,
            data: Some(receipt),
            error: None,
            is_rate_limited: None,
        }
    }

    pub fn failed(platform: impl Into<String>, error: &PlatformError) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            data: None,
            error: Some(error.to_string()),
            is_rate_limited: Some(error.is_rate_limited()),
        }
    }

    /// Not attempted at all (e.g. the task is switched off)
    pub fn skipped(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            data: None,
            error: Some(reason.into()),
            is_rate_limited: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_mime_from_header_value() {
        assert_eq!(
            ImageMimeType::from_mime_str("image/png; charset=binary"),
            Some(ImageMimeType::Png)
        );
        assert_eq!(
            ImageMimeType::from_mime_str("IMAGE/JPG"),
            Some(ImageMimeType::Jpeg)
        );
        assert_eq!(ImageMimeType::from_mime_str("text/html"), None);
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(ImageMimeType::from_extension("WEBP"), Some(ImageMimeType::WebP));
        assert_eq!(ImageMimeType::from_extension("bmp"), None);
        assert_eq!(ImageMimeType::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_post_request_media() {
        let request = PostRequest::new("hello");
        assert!(!request.has_media());
        let request = request.with_media(MediaItem::new(vec![1, 2, 3], ImageMimeType::Png, "alt"));
        assert!(request.has_media());
        assert!(format!("{:?}", request.media[0]).contains("bytes: 3"));
    }

    #[test]
    fn test_failed_result_flags_rate_limit() {
        let result = PostResult::failed(
            "bluesky",
            &PlatformError::CircuitOpen {
                remaining: Duration::from_secs(30),
            },
        );
        assert!(!result.success);
        assert_eq!(result.is_rate_limited, Some(true));

        let result = PostResult::failed("bluesky", &PlatformError::Posting("nope".into()));
        assert_eq!(result.is_rate_limited, Some(false));
    }

    #[test]
    fn test_post_result_json_shape() {
        let result = PostResult::posted(
            "bluesky",
            PostReceipt::new("3k2a").with_uri("at://did:plc:abc/app.bsky.feed.post/3k2a"),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "3k2a");
        assert!(json["error"].is_null());
        assert!(json.get("isRateLimited").is_none());
    }
}
