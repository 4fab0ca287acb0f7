//! Wiring from [`Config`] to a ready orchestrator

use std::sync::Arc;

use tracing::info;

use crate::client::PostingClient;
use crate::config::Config;
use crate::content::MarketContent;
use crate::error::{ApiError, ConfigError, Result};
use crate::images::{HttpImageSource, LocalImageStore};
use crate::market::MarketDataClient;
use crate::platforms::bluesky::BlueskyPlatform;
use crate::platforms::disabled::DisabledPlatform;
use crate::platforms::twitter::TwitterPlatform;
use crate::platforms::Platform;
use crate::tasks::TaskOrchestrator;

pub const TWITTER: &str = "twitter";
pub const BLUESKY: &str = "bluesky";

/// Build the platform clients in posting order
///
/// Twitter is always present; when `TWITTER_ENABLED` is off it is a
/// [`DisabledPlatform`] that answers without network I/O.
///
/// # Examples
///
/// ```no_run
/// use libsatcast::{app::create_platforms, Config};
///
/// # fn example() -> libsatcast::Result<()> {
/// let config = Config::from_env()?;
/// let platforms = create_platforms(&config)?;
/// println!("Created {} platform clients", platforms.len());
/// # Ok(())
/// # }
/// ```
pub fn create_platforms(config: &Config) -> Result<Vec<Arc<dyn Platform>>> {
    let timeout = config.posting.request_timeout;
    let mut platforms: Vec<Arc<dyn Platform>> = Vec::new();

    if config.twitter.enabled {
        let token = config
            .twitter
            .access_token
            .clone()
            .ok_or_else(|| ConfigError::MissingFields(vec!["TWITTER_ACCESS_TOKEN".into()]))?;
        info!("Creating Twitter platform client");
        let twitter = TwitterPlatform::new(&config.twitter.api_url, token, timeout)
            .map_err(|e| ApiError::new(TWITTER, e))?;
        platforms.push(Arc::new(twitter));
    } else {
        info!("Twitter is disabled, posts will be simulated");
        platforms.push(Arc::new(DisabledPlatform::new(TWITTER)));
    }

    info!(handle = %config.bluesky.handle, "Creating Bluesky platform client");
    let bluesky =
        BlueskyPlatform::new(&config.bluesky, timeout).map_err(|e| ApiError::new(BLUESKY, e))?;
    platforms.push(Arc::new(bluesky));

    Ok(platforms)
}

/// Build the full orchestrator: market data, images, and one posting client per platform
pub fn build_orchestrator(config: &Config) -> Result<TaskOrchestrator> {
    let timeout = config.posting.request_timeout;

    let market = MarketDataClient::new(&config.market, timeout)?;
    let fear_greed_image = HttpImageSource::new(
        Some(config.images.fear_greed_image_url.clone()),
        "FEAR_GREED_INDEX_IMAGE_URL",
        timeout,
    )?;
    let monthly_chart = HttpImageSource::new(
        config.images.monthly_chart_url.clone(),
        "MONTHLY_RETURNS_CHART_URL",
        timeout,
    )?;
    let store = LocalImageStore::new(&config.images.dir, &config.images.public_base_url)?;

    let content = MarketContent::new(
        Arc::new(market),
        Arc::new(fear_greed_image),
        Arc::new(monthly_chart),
        Arc::new(store),
        config.donation.clone(),
    );

    let clients = create_platforms(config)?
        .into_iter()
        .map(|platform| PostingClient::new(platform, &config.posting))
        .collect();

    Ok(TaskOrchestrator::new(Arc::new(content), clients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut map: HashMap<String, String> = [
            ("COIN_ID", "bitcoin"),
            ("CURRENCY", "usd"),
            ("COINGECKO_API_URL", "http://127.0.0.1:9/api/v3"),
            ("BLUESKY_HANDLE", "satcast.bsky.social"),
            ("BLUESKY_APP_PASSWORD", "app-password"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(move |key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_platforms_with_twitter_disabled() {
        let platforms = create_platforms(&config(&[])).unwrap();
        let names: Vec<_> = platforms.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec![TWITTER, BLUESKY]);
        assert!(!platforms[0].supports_media());
        assert!(platforms[1].supports_media());
    }

    #[test]
    fn test_platforms_with_twitter_enabled() {
        let platforms = create_platforms(&config(&[
            ("TWITTER_ENABLED", "true"),
            ("TWITTER_ACCESS_TOKEN", "token"),
        ]))
        .unwrap();
        assert_eq!(platforms[0].name(), TWITTER);
        assert!(platforms[0].supports_media());
    }

    #[test]
    fn test_orchestrator_has_one_client_per_platform() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().to_str().unwrap().to_string();
        let orchestrator = build_orchestrator(&config(&[("IMAGE_DIR", dir.as_str())])).unwrap();
        assert_eq!(orchestrator.platforms(), vec![TWITTER, BLUESKY]);
    }
}
