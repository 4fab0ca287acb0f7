//! Image download and the local public image store
//!
//! Stored files are named `<base>_<unix ms>.<ext>` and served under the
//! configured public base URL. Only the newest [`KEEP_PER_BASE`] files of
//! each base name are kept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ApiError, PlatformError, Result, SatcastError};
use crate::types::{ImageMimeType, MediaItem};

pub const IMAGE_DOWNLOAD: &str = "Image download";

pub const KEEP_PER_BASE: usize = 10;

/// Raw image bytes with their type
#[derive(Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: ImageMimeType,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime_type: ImageMimeType) -> Self {
        Self { bytes, mime_type }
    }

    pub fn into_media(self, alt_text: impl Into<String>) -> MediaItem {
        MediaItem::new(self.bytes, self.mime_type, alt_text)
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Fetch an image over HTTP
///
/// The type comes from `Content-Type`, falling back to the URL's extension.
pub async fn download_image(http: &reqwest::Client, url: &str) -> Result<ImageData> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ApiError::new(IMAGE_DOWNLOAD, PlatformError::from(e)))?;

    let status = response.status();
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        return Err(ApiError::new(
            IMAGE_DOWNLOAD,
            PlatformError::from_status(status.as_u16(), format!("Failed to download image: {}", reason)),
        )
        .into());
    }

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ImageMimeType::from_mime_str);
    let mime_type = header_type
        .or_else(|| mime_from_url(url))
        .ok_or_else(|| {
            SatcastError::Validation(format!("Unsupported image type at {}", url))
        })?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::new(IMAGE_DOWNLOAD, PlatformError::from(e)))?;
    if bytes.is_empty() {
        return Err(SatcastError::Validation(format!("Empty image at {}", url)));
    }

    debug!(url, bytes = bytes.len(), mime_type = %mime_type, "Downloaded image");
    Ok(ImageData::new(bytes.to_vec(), mime_type))
}

fn mime_from_url(url: &str) -> Option<ImageMimeType> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    ImageMimeType::from_extension(ext)
}

/// Produces an image on demand (a published picture, a rendered chart)
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self) -> Result<ImageData>;
}

/// Fetches the image published at a configured URL
///
/// The monthly returns heatmap is rendered by an external screenshot
/// service; capturing it means fetching that URL.
pub struct HttpImageSource {
    http: reqwest::Client,
    url: Option<String>,
    setting: &'static str,
}

impl HttpImageSource {
    /// `setting` names the configuration key reported when `url` is unset
    pub fn new(
        url: Option<String>,
        setting: &'static str,
        request_timeout: std::time::Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::new(IMAGE_DOWNLOAD, PlatformError::from(e)))?;
        Ok(Self { http, url, setting })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self) -> Result<ImageData> {
        let url = self.url.as_deref().ok_or_else(|| {
            SatcastError::Validation(format!("No image URL configured ({} is not set)", self.setting))
        })?;
        download_image(&self.http, url).await
    }
}

/// A saved image and where it can be fetched from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub public_url: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `image` under a name derived from `base_name`
    async fn save(&self, image: &ImageData, base_name: &str) -> Result<StoredImage>;
}

pub struct LocalImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    /// `dir` may start with `~` or contain environment variables
    pub fn new(dir: &str, public_base_url: &str) -> Result<Self> {
        let expanded = shellexpand::full(dir).map_err(|e| {
            SatcastError::InvalidInput(format!("Cannot expand image directory '{}': {}", dir, e))
        })?;
        Ok(Self {
            dir: PathBuf::from(expanded.as_ref()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete all but the newest [`KEEP_PER_BASE`] files named `<base_name>_<ms>.*`
    pub async fn cleanup(&self, base_name: &str) -> Result<usize> {
        let prefix = format!("{}_", base_name);
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut stamped = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let stamp = rest.split('.').next().unwrap_or_default();
            if let Ok(ms) = stamp.parse::<i64>() {
                stamped.push((ms, entry.path()));
            }
        }

        stamped.sort_by(|a, b| b.0.cmp(&a.0));
        let mut removed = 0;
        for (_, path) in stamped.into_iter().skip(KEEP_PER_BASE) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), "Deleted old image");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old image"),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, image: &ImageData, base_name: &str) -> Result<StoredImage> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!(
            "{}_{}.{}",
            base_name,
            chrono::Utc::now().timestamp_millis(),
            image.mime_type.extension()
        );
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &image.bytes).await?;

        let public_url = format!("{}/{}", self.public_base_url, file_name);
        info!(file = %file_name, bytes = image.bytes.len(), url = %public_url, "Image saved locally");

        if let Err(e) = self.cleanup(base_name).await {
            warn!(base_name, error = %e, "Failed to clean up old images");
        }

        Ok(StoredImage { path, public_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png() -> ImageData {
        ImageData::new(vec![0x89, b'P', b'N', b'G'], ImageMimeType::Png)
    }

    #[test]
    fn test_mime_from_url() {
        assert_eq!(
            mime_from_url("https://alternative.me/crypto/fear-and-greed-index.png"),
            Some(ImageMimeType::Png)
        );
        assert_eq!(
            mime_from_url("https://example.com/chart.jpeg?v=2"),
            Some(ImageMimeType::Jpeg)
        );
        assert_eq!(mime_from_url("https://example.com/chart"), None);
    }

    #[tokio::test]
    async fn test_save_writes_timestamped_file() {
        let temp = TempDir::new().unwrap();
        let store = LocalImageStore::new(
            temp.path().to_str().unwrap(),
            "http://localhost:3000/images/",
        )
        .unwrap();

        let stored = store.save(&png(), "fearGreedIndex").await.unwrap();

        let file_name = stored.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with("fearGreedIndex_"));
        assert!(file_name.ends_with(".png"));
        assert_eq!(
            stored.public_url,
            format!("http://localhost:3000/images/{}", file_name)
        );
        assert_eq!(std::fs::read(&stored.path).unwrap(), png().bytes);
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("public").join("images");
        let store = LocalImageStore::new(nested.to_str().unwrap(), "http://x").unwrap();

        store.save(&png(), "chart").await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_newest_per_base_name() {
        let temp = TempDir::new().unwrap();
        let store = LocalImageStore::new(temp.path().to_str().unwrap(), "http://x").unwrap();

        for ms in 1..=12 {
            std::fs::write(temp.path().join(format!("chart_{}.png", ms)), b"x").unwrap();
        }
        std::fs::write(temp.path().join("other_1.png"), b"x").unwrap();
        std::fs::write(temp.path().join("chart_notes.txt"), b"x").unwrap();

        let removed = store.cleanup("chart").await.unwrap();

        assert_eq!(removed, 2);
        assert!(!temp.path().join("chart_1.png").exists());
        assert!(!temp.path().join("chart_2.png").exists());
        assert!(temp.path().join("chart_3.png").exists());
        assert!(temp.path().join("chart_12.png").exists());
        assert!(temp.path().join("other_1.png").exists());
        assert!(temp.path().join("chart_notes.txt").exists());
    }

    #[tokio::test]
    async fn test_source_without_url_is_validation_error() {
        let source = HttpImageSource::new(
            None,
            "MONTHLY_RETURNS_CHART_URL",
            std::time::Duration::from_secs(5),
        )
        .unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SatcastError::Validation(_)));
        assert!(err.to_string().contains("MONTHLY_RETURNS_CHART_URL"));
    }

    #[test]
    fn test_into_media_keeps_type() {
        let media = png().into_media("alt");
        assert_eq!(media.mime_type, ImageMimeType::Png);
        assert_eq!(media.alt_text, "alt");
    }
}
