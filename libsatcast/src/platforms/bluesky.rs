//! Bluesky platform implementation over AT Protocol XRPC

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::BlueskyConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::platforms::{error_from_response, MediaRef, Platform};
use crate::types::{MediaItem, PostReceipt};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: Value,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

pub struct BlueskyPlatform {
    http: reqwest::Client,
    service_url: String,
    handle: String,
    app_password: SecretString,
    session: Mutex<Option<Session>>,
}

impl BlueskyPlatform {
    /// Create a Bluesky client; the session is created lazily on first use
    pub fn new(config: &BlueskyConfig, request_timeout: Duration) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            handle: config.handle.clone(),
            app_password: config.app_password.clone(),
            session: Mutex::new(None),
        })
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, method)
    }

    /// The cached session, or a new one; the flag is true when just created
    async fn session(&self) -> PlatformResult<(Session, bool)> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            return Ok((existing.clone(), false));
        }

        debug!(handle = %self.handle, "Creating Bluesky session");
        let response = self
            .http
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({
                "identifier": self.handle,
                "password": self.app_password.expose_secret(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let created: Session = response.json().await?;
        *session = Some(created.clone());
        Ok((created, true))
    }

    /// Run `op` with a session, logging in again once if a cached session
    /// is rejected
    ///
    /// Access tokens expire after a couple of hours. A rejection of a session
    /// created for this very call is returned as is.
    async fn with_session<T, F, Fut>(&self, op: F) -> PlatformResult<T>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let (session, fresh) = self.session().await?;
        match op(session).await {
            Err(PlatformError::Authentication(reason)) if !fresh => {
                warn!(reason = %reason, "Bluesky session rejected, logging in again");
                *self.session.lock().await = None;
                let (session, _) = self.session().await?;
                let result = op(session).await;
                if let Err(PlatformError::Authentication(_)) = &result {
                    *self.session.lock().await = None;
                }
                result
            }
            Err(PlatformError::Authentication(reason)) => {
                *self.session.lock().await = None;
                Err(PlatformError::Authentication(reason))
            }
            other => other,
        }
    }

    async fn upload_blob(&self, session: Session, media: &MediaItem) -> PlatformResult<MediaRef> {
        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, media.mime_type.as_str())
            .body(media.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let uploaded: UploadBlobResponse = response.json().await?;
        let cid = uploaded
            .blob
            .pointer("/ref/$link")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(cid = %cid, bytes = media.bytes.len(), "Uploaded blob to Bluesky");

        Ok(MediaRef::new(cid, &media.alt_text).with_descriptor(uploaded.blob))
    }

    async fn create_post(
        &self,
        session: Session,
        text: &str,
        media: &[MediaRef],
    ) -> PlatformResult<PostReceipt> {
        let mut record = json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "facets": hashtag_facets(text),
            "createdAt": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        });
        if let Some(embed) = image_embed(media) {
            record["embed"] = embed;
        }

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": record,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let created: CreateRecordResponse = response.json().await?;
        let rkey = created
            .uri
            .rsplit('/')
            .next()
            .unwrap_or(created.uri.as_str())
            .to_string();
        debug!(uri = %created.uri, "Posted to Bluesky");

        Ok(PostReceipt::new(rkey).with_uri(created.uri))
    }
}

#[async_trait]
impl Platform for BlueskyPlatform {
    fn name(&self) -> &str {
        "bluesky"
    }

    fn supports_media(&self) -> bool {
        true
    }

    async fn upload_media(&self, media: &MediaItem) -> PlatformResult<MediaRef> {
        self.with_session(|session| self.upload_blob(session, media))
            .await
    }

    async fn post(&self, text: &str, media: &[MediaRef]) -> PlatformResult<PostReceipt> {
        self.with_session(|session| self.create_post(session, text, media))
            .await
    }
}

fn image_embed(media: &[MediaRef]) -> Option<Value> {
    let images: Vec<Value> = media
        .iter()
        .filter_map(|m| {
            m.descriptor
                .as_ref()
                .map(|blob| json!({ "image": blob, "alt": m.alt_text }))
        })
        .collect();

    if images.is_empty() {
        None
    } else {
        Some(json!({ "$type": "app.bsky.embed.images", "images": images }))
    }
}

/// Rich-text tag facets for every `#word` in `text`
///
/// Offsets are UTF-8 byte positions, which is what the AT Protocol expects.
pub fn hashtag_facets(text: &str) -> Vec<Value> {
    let bytes = text.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut facets = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'#' {
            let start = i;
            let mut end = i + 1;
            while end < bytes.len() && is_word(bytes[end]) {
                end += 1;
            }
            if end > start + 1 {
                facets.push(json!({
                    "index": { "byteStart": start, "byteEnd": end },
                    "features": [{
                        "$type": "app.bsky.richtext.facet#tag",
                        "tag": &text[start + 1..end],
                    }],
                }));
            }
            i = end;
        } else {
            i += 1;
        }
    }

    facets
}
