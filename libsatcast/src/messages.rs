//! Post text templates

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::market::{FearGreedReading, MarketChart};
use crate::prices::{
    current_price, format_currency, format_date, format_percent, price_change_1h, PriceSummary,
};

pub const MONTHLY_RETURNS_ALT_TEXT: &str = "Bitcoin Monthly Returns Heatmap";

pub fn hourly_update(chart: &MarketChart) -> Result<String> {
    let price = format_currency(current_price(chart)?)?;
    let change = format_percent(price_change_1h(chart)?);
    Ok(format!(
        "#Bitcoin is currently trading at:\n💰 {} ({} in the last 1h)",
        price, change
    ))
}

pub fn daily_update(chart: &MarketChart, now: DateTime<Utc>) -> Result<String> {
    let s = PriceSummary::from_chart(chart)?;
    Ok(format!(
        "#Bitcoin 24h Update - {date}\n\n\
         💰 Current Price:\n{price} (1h: {c1h}, 24h: {c24h})\n\n\
         💵 Market Cap:\n{cap} (24h Change: {cap_change})\n\n\
         📊 Volume:\n{volume} (24h Change: {volume_change})",
        date = format_date(now),
        price = s.current_price,
        c1h = s.change_1h,
        c24h = s.change_24h,
        cap = s.market_cap,
        cap_change = s.market_cap_change_24h,
        volume = s.volume,
        volume_change = s.volume_change_24h,
    ))
}

pub fn fear_greed(reading: &FearGreedReading) -> String {
    format!(
        "#Bitcoin Fear & Greed Index is {} - {}",
        reading.value, reading.value_classification
    )
}

pub fn fear_greed_alt_text(reading: &FearGreedReading) -> String {
    format!(
        "Fear & Greed Index is {} ({})",
        reading.value, reading.value_classification
    )
}

/// Posted on the last day of the month, so `now` names the month that is ending
pub fn monthly_returns(now: DateTime<Utc>) -> String {
    format!("#Bitcoin Monthly Returns - {}", now.format("%B %Y"))
}

pub fn donation_reminder(onchain_address: &str, lightning_address: &str) -> String {
    format!(
        "Support this Bitcoin bot:\n\nOn-chain: {}\nLightning: {}",
        onchain_address, lightning_address
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::tests::sample_chart;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_update() {
        assert_eq!(
            hourly_update(&sample_chart()).unwrap(),
            "#Bitcoin is currently trading at:\n💰 $41,200.00 (3.00% in the last 1h)"
        );
    }

    #[test]
    fn test_daily_update() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let text = daily_update(&sample_chart(), now).unwrap();

        assert!(text.starts_with("#Bitcoin 24h Update - Mar 2nd, 2024\n\n"));
        assert!(text.contains("💰 Current Price:\n$41,200.00 (1h: 3.00%, 24h: 3.00%)\n\n"));
        assert!(text.contains("💵 Market Cap:\n$820,000,000,000.00 (24h Change: 2.50%)\n\n"));
        assert!(text.ends_with("📊 Volume:\n$15,000,000,000.00 (24h Change: -25.00%)"));
    }

    #[test]
    fn test_fear_greed_texts() {
        let reading = FearGreedReading {
            value: "72".to_string(),
            value_classification: "Greed".to_string(),
        };
        assert_eq!(fear_greed(&reading), "#Bitcoin Fear & Greed Index is 72 - Greed");
        assert_eq!(fear_greed_alt_text(&reading), "Fear & Greed Index is 72 (Greed)");
    }

    #[test]
    fn test_monthly_returns() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(monthly_returns(now), "#Bitcoin Monthly Returns - January 2024");
    }

    #[test]
    fn test_donation_reminder() {
        assert_eq!(
            donation_reminder("bc1qexample", "sats@getalby.com"),
            "Support this Bitcoin bot:\n\nOn-chain: bc1qexample\nLightning: sats@getalby.com"
        );
    }
}
