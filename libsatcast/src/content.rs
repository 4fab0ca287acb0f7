//! Content gathering for each task
//!
//! [`MarketContent`] pulls market data and images, fills the message
//! templates, and hands back a ready [`PostRequest`]. Any failure here fails
//! the task before a platform is contacted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::DonationConfig;
use crate::error::{Result, SatcastError};
use crate::images::{ImageSource, ImageStore};
use crate::market::MarketData;
use crate::messages;
use crate::tasks::Task;
use crate::types::PostRequest;

/// What a task should do after gathering
#[derive(Debug, Clone)]
pub enum Content {
    Post(PostRequest),
    /// Do not post; every platform reports `reason`
    Skip(String),
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn gather(&self, task: Task) -> Result<Content>;
}

pub struct MarketContent {
    market: Arc<dyn MarketData>,
    fear_greed_image: Arc<dyn ImageSource>,
    monthly_chart: Arc<dyn ImageSource>,
    images: Arc<dyn ImageStore>,
    donation: DonationConfig,
}

impl MarketContent {
    pub fn new(
        market: Arc<dyn MarketData>,
        fear_greed_image: Arc<dyn ImageSource>,
        monthly_chart: Arc<dyn ImageSource>,
        images: Arc<dyn ImageStore>,
        donation: DonationConfig,
    ) -> Self {
        Self {
            market,
            fear_greed_image,
            monthly_chart,
            images,
            donation,
        }
    }

    async fn fear_greed(&self) -> Result<PostRequest> {
        let reading = self.market.fear_greed().await?;
        let image = self.fear_greed_image.fetch().await?;
        let stored = self.images.save(&image, "fearGreedIndex").await?;
        debug!(url = %stored.public_url, "Fear & Greed image stored");

        Ok(PostRequest::new(messages::fear_greed(&reading))
            .with_media(image.into_media(messages::fear_greed_alt_text(&reading))))
    }

    async fn monthly_returns(&self) -> Result<PostRequest> {
        let chart = self.monthly_chart.fetch().await?;
        let stored = self.images.save(&chart, "bitcoinMonthlyReturns").await?;
        info!(url = %stored.public_url, "Monthly returns chart stored");

        Ok(PostRequest::new(messages::monthly_returns(Utc::now()))
            .with_media(chart.into_media(messages::MONTHLY_RETURNS_ALT_TEXT)))
    }

    fn donation_reminder(&self) -> Result<Content> {
        if !self.donation.enabled {
            info!("Donation reminder is disabled via configuration");
            return Ok(Content::Skip("disabled".to_string()));
        }

        match (&self.donation.onchain_address, &self.donation.lightning_address) {
            (Some(onchain), Some(lightning)) => Ok(Content::Post(PostRequest::new(
                messages::donation_reminder(onchain, lightning),
            ))),
            _ => Err(SatcastError::Validation(
                "Donation addresses are not properly configured. Please set \
                 DONATION_ONCHAIN_ADDRESS and DONATION_LIGHTNING_ADDRESS in the environment."
                    .into(),
            )),
        }
    }
}

#[async_trait]
impl ContentSource for MarketContent {
    async fn gather(&self, task: Task) -> Result<Content> {
        let request = match task {
            Task::Bitcoin1hPriceUpdate => {
                let chart = self.market.market_chart().await?;
                PostRequest::new(messages::hourly_update(&chart)?)
            }
            Task::Bitcoin24hPriceUpdate => {
                let chart = self.market.market_chart().await?;
                PostRequest::new(messages::daily_update(&chart, Utc::now())?)
            }
            Task::FearGreedIndex => self.fear_greed().await?,
            Task::BitcoinMonthlyReturns => self.monthly_returns().await?,
            Task::DonationReminder => return self.donation_reminder(),
        };
        Ok(Content::Post(request))
    }
}
