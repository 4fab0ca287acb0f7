//! Configuration management for Satcast
//!
//! Everything comes from environment variables, optionally seeded from a
//! `.env` file. [`Config::from_lookup`] does the parsing against any key
//! lookup so it can be tested without touching the process environment.

use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use crate::client::PostingSettings;
use crate::error::{ConfigError, Result};

pub const DEFAULT_FEAR_GREED_API_URL: &str = "https://api.alternative.me/fng/";
pub const DEFAULT_BLUESKY_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_TWITTER_API_URL: &str = "https://api.twitter.com";
pub const DEFAULT_IMAGE_DIR: &str = "./public/images";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000/images";
pub const DEFAULT_FEAR_GREED_IMAGE_URL: &str =
    "https://alternative.me/crypto/fear-and-greed-index.png";
pub const DEFAULT_DONATION_INTERVAL_DAYS: u64 = 7;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug)]
pub struct Config {
    pub market: MarketConfig,
    pub bluesky: BlueskyConfig,
    pub twitter: TwitterConfig,
    pub images: ImageConfig,
    pub donation: DonationConfig,
    pub posting: PostingSettings,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub coin_id: String,
    pub currency: String,
    pub coingecko_url: String,
    pub fear_greed_url: String,
}

#[derive(Debug, Clone)]
pub struct BlueskyConfig {
    pub handle: String,
    pub app_password: SecretString,
    pub service_url: String,
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub enabled: bool,
    /// Present whenever `enabled` is true
    pub access_token: Option<SecretString>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub dir: String,
    pub public_base_url: String,
    pub fear_greed_image_url: String,
    pub monthly_chart_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationConfig {
    pub enabled: bool,
    pub onchain_address: Option<String>,
    pub lightning_address: Option<String>,
    pub interval_days: u64,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            onchain_address: None,
            lightning_address: None,
            interval_days: DEFAULT_DONATION_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str, missing: &mut Vec<String>) -> String {
        self.get(key).unwrap_or_else(|| {
            missing.push(key.to_string());
            String::new()
        })
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(v) => match v.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, &v, "expected true or false")),
            },
        }
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => humantime::parse_duration(&v).map_err(|e| invalid(key, &v, &e.to_string())),
        }
    }

    fn number<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|e: T::Err| invalid(key, &v, &e.to_string())),
        }
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> crate::error::SatcastError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Positive whole days; anything else falls back to the default with a warning
fn parse_interval_days(raw: Option<String>) -> u64 {
    match raw {
        None => DEFAULT_DONATION_INTERVAL_DAYS,
        Some(v) => match v.parse::<i64>() {
            Ok(days) if days > 0 => days as u64,
            _ => {
                warn!(
                    value = %v,
                    default = DEFAULT_DONATION_INTERVAL_DAYS,
                    "Invalid DONATION_INTERVAL_DAYS, using default"
                );
                DEFAULT_DONATION_INTERVAL_DAYS
            }
        },
    }
}

impl Config {
    /// Load from the process environment after reading `.env` if present
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal in production
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFields` listing every missing required key,
    /// or `ConfigError::InvalidValue` for the first unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut missing = Vec::new();

        let twitter_enabled = env.bool("TWITTER_ENABLED")?;

        let coin_id = env.required("COIN_ID", &mut missing);
        let currency = env.required("CURRENCY", &mut missing);
        let coingecko_url = env.required("COINGECKO_API_URL", &mut missing);
        let handle = env.required("BLUESKY_HANDLE", &mut missing);
        let app_password = env.required("BLUESKY_APP_PASSWORD", &mut missing);
        let access_token = if twitter_enabled {
            Some(env.required("TWITTER_ACCESS_TOKEN", &mut missing))
        } else {
            env.get("TWITTER_ACCESS_TOKEN")
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing).into());
        }

        let posting = PostingSettings {
            min_interval: env.duration("POST_MIN_INTERVAL", PostingSettings::default().min_interval)?,
            breaker_threshold: env.number(
                "CIRCUIT_BREAKER_THRESHOLD",
                PostingSettings::default().breaker_threshold,
            )?,
            breaker_cooldown: env.duration(
                "CIRCUIT_BREAKER_COOLDOWN",
                PostingSettings::default().breaker_cooldown,
            )?,
            max_attempts: env.number("RETRY_MAX_ATTEMPTS", PostingSettings::default().max_attempts)?,
            base_delay: env.duration("RETRY_BASE_DELAY", PostingSettings::default().base_delay)?,
            rate_limit_delay: env.duration(
                "RETRY_RATE_LIMIT_DELAY",
                PostingSettings::default().rate_limit_delay,
            )?,
            request_timeout: env.duration(
                "REQUEST_TIMEOUT",
                PostingSettings::default().request_timeout,
            )?,
        };

        Ok(Self {
            market: MarketConfig {
                coin_id,
                currency,
                coingecko_url,
                fear_greed_url: env.or("FEAR_GREED_API_URL", DEFAULT_FEAR_GREED_API_URL),
            },
            bluesky: BlueskyConfig {
                handle,
                app_password: SecretString::from(app_password),
                service_url: env.or("BLUESKY_SERVICE_URL", DEFAULT_BLUESKY_SERVICE_URL),
            },
            twitter: TwitterConfig {
                enabled: twitter_enabled,
                access_token: access_token.map(SecretString::from),
                api_url: env.or("TWITTER_API_URL", DEFAULT_TWITTER_API_URL),
            },
            images: ImageConfig {
                dir: env.or("IMAGE_DIR", DEFAULT_IMAGE_DIR),
                public_base_url: env.or("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL),
                fear_greed_image_url: env
                    .or("FEAR_GREED_INDEX_IMAGE_URL", DEFAULT_FEAR_GREED_IMAGE_URL),
                monthly_chart_url: env.get("MONTHLY_RETURNS_CHART_URL"),
            },
            donation: DonationConfig {
                enabled: env.bool("DONATION_ENABLED")?,
                onchain_address: env.get("DONATION_ONCHAIN_ADDRESS"),
                lightning_address: env.get("DONATION_LIGHTNING_ADDRESS"),
                interval_days: parse_interval_days(env.get("DONATION_INTERVAL_DAYS")),
            },
            posting,
            server: ServerConfig {
                host: env.or("HOST", DEFAULT_HOST),
                port: env.number("PORT", DEFAULT_PORT)?,
            },
        })
    }
}
