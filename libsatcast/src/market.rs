//! Market data feeds: CoinGecko price history and the Fear & Greed Index

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MarketConfig;
use crate::error::{ApiError, PlatformError, Result, SatcastError};

pub const COINGECKO: &str = "CoinGecko";
pub const FEAR_GREED: &str = "Fear & Greed Index";

/// One `[timestamp_ms, value]` sample
pub type Sample = [f64; 2];

/// CoinGecko `market_chart` response for the last 24h
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<Sample>,
    #[serde(default)]
    pub market_caps: Vec<Sample>,
    #[serde(default)]
    pub total_volumes: Vec<Sample>,
}

/// Latest Fear & Greed reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    pub value: String,
    pub value_classification: String,
}

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    #[serde(default)]
    data: Vec<FearGreedEntry>,
}

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    #[serde(default)]
    value: String,
    #[serde(default)]
    value_classification: String,
}

/// Source of market data for the posting tasks
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn market_chart(&self) -> Result<MarketChart>;

    async fn fear_greed(&self) -> Result<FearGreedReading>;
}

pub struct MarketDataClient {
    http: reqwest::Client,
    coingecko_url: String,
    coin_id: String,
    currency: String,
    fear_greed_url: String,
}

impl MarketDataClient {
    pub fn new(config: &MarketConfig, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::new(COINGECKO, PlatformError::from(e)))?;

        Ok(Self {
            http,
            coingecko_url: config.coingecko_url.trim_end_matches('/').to_string(),
            coin_id: config.coin_id.clone(),
            currency: config.currency.clone(),
            fear_greed_url: config.fear_greed_url.clone(),
        })
    }

    /// GET `url` and decode the JSON body, attributing failures to `service`
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        service: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::new(service, PlatformError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            return Err(
                ApiError::new(service, PlatformError::from_status(status.as_u16(), reason)).into(),
            );
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                SatcastError::Validation(format!("Invalid response from {}: {}", service, e))
            } else {
                ApiError::new(service, PlatformError::from(e)).into()
            }
        })
    }
}

#[async_trait]
impl MarketData for MarketDataClient {
    async fn market_chart(&self) -> Result<MarketChart> {
        let url = format!(
            "{}/coins/{}/market_chart",
            self.coingecko_url, self.coin_id
        );
        debug!(url = %url, currency = %self.currency, "Fetching market chart");

        let request = self.http.get(&url).query(&[
            ("vs_currency", self.currency.as_str()),
            ("days", "1"),
            ("precision", "2"),
        ]);
        let chart: MarketChart = self.get_json(COINGECKO, request).await?;
        validate_chart(&chart)?;
        Ok(chart)
    }

    async fn fear_greed(&self) -> Result<FearGreedReading> {
        debug!(url = %self.fear_greed_url, "Fetching Fear & Greed Index");

        let response: FearGreedResponse = self
            .get_json(FEAR_GREED, self.http.get(&self.fear_greed_url))
            .await?;

        let entry = response.data.into_iter().next().ok_or_else(|| {
            SatcastError::Validation("Invalid or empty Fear & Greed Index data received".into())
        })?;
        if entry.value.is_empty() || entry.value_classification.is_empty() {
            return Err(SatcastError::Validation(
                "Invalid response structure from Fear & Greed Index API".into(),
            ));
        }

        Ok(FearGreedReading {
            value: entry.value,
            value_classification: entry.value_classification,
        })
    }
}

/// Reject charts missing any of the three series
pub fn validate_chart(chart: &MarketChart) -> Result<()> {
    if chart.prices.is_empty() {
        return Err(SatcastError::Validation(
            "Invalid or empty prices data".into(),
        ));
    }
    if chart.market_caps.is_empty() {
        return Err(SatcastError::Validation(
            "Invalid or empty market caps data".into(),
        ));
    }
    if chart.total_volumes.is_empty() {
        return Err(SatcastError::Validation(
            "Invalid or empty total volumes data".into(),
        ));
    }
    Ok(())
}
