//! Twitter (X) platform implementation over the v2 API
//!
//! Authenticates with an OAuth 2.0 user access token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{PlatformError, PlatformResult};
use crate::platforms::{error_from_response, MediaRef, Platform};
use crate::types::{MediaItem, PostReceipt};

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

pub struct TwitterPlatform {
    http: reqwest::Client,
    api_url: String,
    access_token: SecretString,
}

impl TwitterPlatform {
    pub fn new(
        api_url: &str,
        access_token: SecretString,
        request_timeout: Duration,
    ) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/2/{}", self.api_url, path)
    }

    async fn set_alt_text(&self, media_id: &str, alt_text: &str) -> PlatformResult<()> {
        let response = self
            .http
            .post(self.endpoint("media/metadata"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({
                "id": media_id,
                "metadata": { "alt_text": { "text": alt_text } },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for TwitterPlatform {
    fn name(&self) -> &str {
        "twitter"
    }

    fn supports_media(&self) -> bool {
        true
    }

    async fn upload_media(&self, media: &MediaItem) -> PlatformResult<MediaRef> {
        let part = Part::bytes(media.bytes.clone())
            .file_name(format!("image.{}", media.mime_type.extension()))
            .mime_str(media.mime_type.as_str())
            .map_err(|e| PlatformError::Validation(format!("Invalid media type: {}", e)))?;
        let form = Form::new()
            .part("media", part)
            .text("media_category", "tweet_image");

        let response = self
            .http
            .post(self.endpoint("media/upload"))
            .bearer_auth(self.access_token.expose_secret())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let uploaded: DataEnvelope<MediaData> = response.json().await?;
        let media_id = uploaded.data.id;
        debug!(media_id = %media_id, bytes = media.bytes.len(), "Uploaded media to Twitter");

        if !media.alt_text.is_empty() {
            if let Err(e) = self.set_alt_text(&media_id, &media.alt_text).await {
                warn!(media_id = %media_id, error = %e, "Failed to set Twitter alt text");
            }
        }

        Ok(MediaRef::new(media_id, &media.alt_text))
    }

    async fn post(&self, text: &str, media: &[MediaRef]) -> PlatformResult<PostReceipt> {
        let mut body = json!({ "text": text });
        if !media.is_empty() {
            let ids: Vec<&str> = media.iter().map(|m| m.id.as_str()).collect();
            body["media"] = json!({ "media_ids": ids });
        }

        let response = self
            .http
            .post(self.endpoint("tweets"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let created: DataEnvelope<TweetData> = response.json().await?;
        debug!(tweet_id = %created.data.id, "Posted to Twitter");

        let uri = format!("https://x.com/i/web/status/{}", created.data.id);
        Ok(PostReceipt::new(created.data.id).with_uri(uri))
    }
}
