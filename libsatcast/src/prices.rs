//! Price figures derived from a 24h market chart, plus the number formatting
//! used in messages.

use chrono::{DateTime, Datelike, Utc};

use crate::error::{Result, SatcastError};
use crate::market::{validate_chart, MarketChart, Sample};

/// Samples per hour in CoinGecko's 5-minute granularity
const SAMPLES_PER_HOUR: usize = 12;

/// Percentage change from `previous` to `current`
///
/// # Errors
///
/// Returns `SatcastError::Validation` when `previous` is zero.
pub fn percentage_change(current: f64, previous: f64) -> Result<f64> {
    if previous == 0.0 {
        return Err(SatcastError::Validation(
            "Cannot calculate percentage change: previous value is zero".into(),
        ));
    }
    Ok((current - previous) / previous * 100.0)
}

/// `12.345` -> `"12.35%"`
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// en-US dollar formatting: `1234567.891` -> `"$1,234,567.89"`
pub fn format_currency(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(SatcastError::Validation(
            "Invalid number for currency formatting".into(),
        ));
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    Ok(format!("{}${}.{}", sign, grouped, cents))
}

/// `"Jan 1st, 2024"`
pub fn format_date(date: DateTime<Utc>) -> String {
    let day = date.day();
    let suffix = match day {
        11..=13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    };
    format!("{} {}{}, {}", date.format("%b"), day, suffix, date.year())
}

fn sample_value(series: &[Sample], index: usize, what: &str) -> Result<f64> {
    let value = series
        .get(index)
        .map(|sample| sample[1])
        .ok_or_else(|| SatcastError::Validation(format!("Invalid {} data index: {}", what, index)))?;
    if !value.is_finite() {
        return Err(SatcastError::Validation(format!(
            "Invalid {} entry at index {}",
            what, index
        )));
    }
    Ok(value)
}

fn last_value(series: &[Sample], what: &str) -> Result<f64> {
    sample_value(series, series.len().saturating_sub(1), what)
}

fn change_24h(series: &[Sample], what: &str) -> Result<f64> {
    percentage_change(last_value(series, what)?, sample_value(series, 0, what)?)
}

/// Headline figures of a market chart, formatted for messages
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub current_price: String,
    pub change_1h: String,
    pub change_24h: String,
    pub market_cap: String,
    pub market_cap_change_24h: String,
    pub volume: String,
    pub volume_change_24h: String,
}

pub fn current_price(chart: &MarketChart) -> Result<f64> {
    validate_chart(chart)?;
    last_value(&chart.prices, "price")
}

/// Change against the sample one hour (12 samples) before the latest
pub fn price_change_1h(chart: &MarketChart) -> Result<f64> {
    validate_chart(chart)?;
    let current = chart.prices.len() - 1;
    let hour_ago = current.checked_sub(SAMPLES_PER_HOUR).ok_or_else(|| {
        SatcastError::Validation("Insufficient data for 1-hour price change calculation".into())
    })?;
    percentage_change(
        sample_value(&chart.prices, current, "price")?,
        sample_value(&chart.prices, hour_ago, "price")?,
    )
}

pub fn price_change_24h(chart: &MarketChart) -> Result<f64> {
    validate_chart(chart)?;
    change_24h(&chart.prices, "price")
}

impl PriceSummary {
    pub fn from_chart(chart: &MarketChart) -> Result<Self> {
        validate_chart(chart)?;
        Ok(Self {
            current_price: format_currency(current_price(chart)?)?,
            change_1h: format_percent(price_change_1h(chart)?),
            change_24h: format_percent(price_change_24h(chart)?),
            market_cap: format_currency(last_value(&chart.market_caps, "market cap")?)?,
            market_cap_change_24h: format_percent(change_24h(&chart.market_caps, "market cap")?),
            volume: format_currency(last_value(&chart.total_volumes, "volume")?)?,
            volume_change_24h: format_percent(change_24h(&chart.total_volumes, "volume")?),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// 13 price samples rising by 100 each, plus two-point cap and volume series
    pub(crate) fn sample_chart() -> MarketChart {
        let prices = (0..13)
            .map(|i| [1_704_067_200_000.0 + i as f64 * 300_000.0, 40_000.0 + i as f64 * 100.0])
            .collect();
        MarketChart {
            prices,
            market_caps: vec![[0.0, 800_000_000_000.0], [1.0, 820_000_000_000.0]],
            total_volumes: vec![[0.0, 20_000_000_000.0], [1.0, 15_000_000_000.0]],
        }
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(format_percent(percentage_change(110.0, 100.0).unwrap()), "10.00%");
        assert_eq!(format_percent(percentage_change(90.0, 100.0).unwrap()), "-10.00%");
        assert!(matches!(
            percentage_change(100.0, 0.0),
            Err(SatcastError::Validation(_))
        ));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(47300.0).unwrap(), "$47,300.00");
        assert_eq!(format_currency(1234567.891).unwrap(), "$1,234,567.89");
        assert_eq!(format_currency(999.999).unwrap(), "$1,000.00");
        assert_eq!(format_currency(0.5).unwrap(), "$0.50");
        assert_eq!(format_currency(-1500.0).unwrap(), "-$1,500.00");
        assert!(format_currency(f64::NAN).is_err());
    }

    #[test]
    fn test_format_date_suffixes() {
        let date = |d| Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap();
        assert_eq!(format_date(date(1)), "Jan 1st, 2024");
        assert_eq!(format_date(date(2)), "Jan 2nd, 2024");
        assert_eq!(format_date(date(3)), "Jan 3rd, 2024");
        assert_eq!(format_date(date(4)), "Jan 4th, 2024");
        assert_eq!(format_date(date(11)), "Jan 11th, 2024");
        assert_eq!(format_date(date(12)), "Jan 12th, 2024");
        assert_eq!(format_date(date(13)), "Jan 13th, 2024");
        assert_eq!(format_date(date(21)), "Jan 21st, 2024");
        assert_eq!(format_date(date(22)), "Jan 22nd, 2024");
        assert_eq!(format_date(date(31)), "Jan 31st, 2024");
    }

    #[test]
    fn test_price_change_1h_uses_twelve_samples_back() {
        let chart = sample_chart();
        // 41200 vs 40000
        assert_eq!(format_percent(price_change_1h(&chart).unwrap()), "3.00%");
    }

    #[test]
    fn test_price_change_1h_insufficient_data() {
        let mut chart = sample_chart();
        chart.prices.truncate(12);
        let err = price_change_1h(&chart).unwrap_err();
        assert!(err.to_string().contains("Insufficient data"));
    }

    #[test]
    fn test_summary() {
        let summary = PriceSummary::from_chart(&sample_chart()).unwrap();
        assert_eq!(summary.current_price, "$41,200.00");
        assert_eq!(summary.change_24h, "3.00%");
        assert_eq!(summary.market_cap, "$820,000,000,000.00");
        assert_eq!(summary.market_cap_change_24h, "2.50%");
        assert_eq!(summary.volume, "$15,000,000,000.00");
        assert_eq!(summary.volume_change_24h, "-25.00%");
    }

    #[test]
    fn test_zero_start_price_is_error() {
        let mut chart = sample_chart();
        chart.prices[0][1] = 0.0;
        assert!(price_change_24h(&chart).is_err());
    }
}
