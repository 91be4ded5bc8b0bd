//! Alpha Vantage daily time series adapter
//!
//! The free tier allows 25 requests per day, which is where the default
//! backfill budget comes from.

use crate::error::{AppError, Result};
use crate::providers::{DailyClose, PriceProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Full history is needed once the requested range leaves the compact window
const COMPACT_WINDOW_DAYS: i64 = 140;

/// Alpha Vantage provider implementation
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    fn request_url(&self, symbol: &str, outputsize: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", outputsize),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid Alpha Vantage URL: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

/// Parse a `TIME_SERIES_DAILY` body into closes, ascending by date
pub fn parse_daily_series(symbol: &str, body: &str) -> Result<Vec<DailyClose>> {
    let response: DailySeriesResponse = serde_json::from_str(body)?;

    if let Some(message) = response.error_message {
        return Err(AppError::Provider(format!("{}: {}", symbol, message)));
    }

    // Throttling is reported in a 200 response as a note
    if let Some(note) = response.note.or(response.information) {
        let lower = note.to_lowercase();
        if lower.contains("rate limit") || lower.contains("call frequency") || lower.contains("requests per day") {
            return Err(AppError::RateLimit(note));
        }
        if response.series.is_none() {
            return Err(AppError::Provider(format!("{}: {}", symbol, note)));
        }
    }

    let series = response
        .series
        .ok_or_else(|| AppError::Provider(format!("{}: response has no daily series", symbol)))?;

    series
        .into_iter()
        .map(|(date, bar)| {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| AppError::Provider(format!("{}: bad date '{}': {}", symbol, date, e)))?;
            let close = bar
                .close
                .parse::<f64>()
                .map_err(|e| AppError::Provider(format!("{}: bad close '{}': {}", symbol, bar.close, e)))?;
            Ok(DailyClose { date, close })
        })
        .collect()
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        "alpha_vantage"
    }

    fn name(&self) -> &'static str {
        "Alpha Vantage"
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyClose>> {
        let today = chrono::Utc::now().date_naive();
        let outputsize = if (today - start).num_days() > COMPACT_WINDOW_DAYS {
            "full"
        } else {
            "compact"
        };

        let url = self.request_url(symbol, outputsize)?;
        tracing::info!("Alpha Vantage request for {} ({})", symbol, outputsize);

        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimit(format!("Alpha Vantage throttled {}", symbol)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("HTTP {}: {}", status, text)));
        }

        let body = response.text().await?;
        parse_daily_series(symbol, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Meta Data": {"2. Symbol": "IBM"},
        "Time Series (Daily)": {
            "2024-03-05": {"1. open": "191.0", "2. high": "193.1", "3. low": "190.5", "4. close": "192.46", "5. volume": "100"},
            "2024-03-04": {"1. open": "190.0", "2. high": "191.9", "3. low": "189.1", "4. close": "191.15", "5. volume": "100"}
        }
    }"#;

    #[test]
    fn test_parse_daily_series() {
        let closes = parse_daily_series("IBM", SAMPLE).unwrap();
        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(closes[1].close, 192.46);
    }

    #[test]
    fn test_rate_limit_note() {
        let body = r#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#;
        let err = parse_daily_series("IBM", body).unwrap_err();
        assert_eq!(err.code(), "RATE_LIMIT");
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"Error Message": "Invalid API call."}"#;
        let err = parse_daily_series("NOPE", body).unwrap_err();
        assert_eq!(err.code(), "PROVIDER_ERROR");
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn test_request_url_encodes_params() {
        let provider = AlphaVantageProvider::new("demo key").unwrap();
        let url = provider.request_url("BRK.B", "compact").unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("function=TIME_SERIES_DAILY"));
        assert!(query.contains("symbol=BRK.B"));
        assert!(query.contains("apikey=demo+key"));
    }
}
