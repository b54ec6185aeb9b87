// src/connectors/kucoin.rs
//
// KuCoin spot market data over the public REST API.
// Only market endpoints are used, so requests are not signed; the account
// credentials are still required so a misconfigured run fails before any
// network traffic.

use crate::error::{LottoError, Result};
use crate::models::{PriceLookup, PriceQuote};
use crate::traits::PriceOracle;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const KUCOIN_API_URL: &str = "https://api.kucoin.com";
pub const KUCOIN_SANDBOX_URL: &str = "https://openapi-sandbox.kucoin.com";

const SUCCESS_CODE: &str = "200000";
const CANDLE_INTERVAL: &str = "5min";
const SECONDS_PER_DAY: i64 = 86_400;

/// API key, secret and passphrase of a KuCoin account.
#[derive(Clone, PartialEq, Eq)]
pub struct KucoinCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub api_password: String,
}

impl fmt::Debug for KucoinCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KucoinCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"***")
            .field("api_password", &"***")
            .finish()
    }
}

/// Keeps only the last 4 characters of a secret.
fn redact(secret: &str) -> String {
    format!("***{}", crate::models::last_chars(secret, 4))
}

/// A single 5-minute candle. KuCoin rows are
/// `[start, open, close, high, low, volume, turnover]`, all strings.
/// Only `start` and `close` must parse; the rest are informational.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Candle start, seconds since the Unix epoch (UTC)
    pub start: i64,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl Candle {
    fn from_row(row: &[String]) -> Option<Self> {
        let field = |idx: usize| row.get(idx).and_then(|v| v.parse::<f64>().ok());
        Some(Self {
            start: row.first()?.parse().ok()?,
            close: field(2)?,
            open: field(1),
            high: field(3),
            low: field(4),
            volume: field(5),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

/// Close of the candle starting exactly at `instant`, scanning in the given
/// order. Should several candles share that start, the last one scanned wins.
pub fn close_at(candles: &[Candle], instant: i64) -> Option<f64> {
    candles
        .iter()
        .filter(|c| c.start == instant)
        .last()
        .map(|c| c.close)
}

/// Start of `date` in UTC, seconds since the Unix epoch.
pub fn utc_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

pub struct KucoinOracle {
    http_client: reqwest::Client,
    base_url: String,
    credentials: KucoinCredentials,
}

impl KucoinOracle {
    pub fn new(credentials: KucoinCredentials, base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LottoError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("KucoinOracle: using {} (key {})", base_url, redact(&credentials.api_key));
        Ok(Self {
            http_client,
            base_url,
            credentials,
        })
    }

    pub fn credentials(&self) -> &KucoinCredentials {
        &self.credentials
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("KucoinOracle: GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| LottoError::Connectivity(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LottoError::Connectivity(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| LottoError::unavailable(format!("Failed to parse response: {}", e)))?;

        if body.code != SUCCESS_CODE {
            return Err(LottoError::unavailable(format!(
                "KuCoin error {}: {}",
                body.code,
                body.msg.unwrap_or_default()
            )));
        }
        body.data
            .ok_or_else(|| LottoError::unavailable(format!("{} returned no data", url)))
    }

    /// Candles for the UTC day of `date`, in the order KuCoin returns them.
    pub async fn fetch_candles(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Candle>> {
        let start = utc_midnight(date);
        let rows: Vec<Vec<String>> = self
            .get(
                "/api/v1/market/candles",
                &[
                    ("type", CANDLE_INTERVAL.to_string()),
                    ("symbol", symbol.to_string()),
                    ("startAt", start.to_string()),
                    ("endAt", (start + SECONDS_PER_DAY).to_string()),
                ],
            )
            .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match Candle::from_row(row) {
                Some(candle) => candles.push(candle),
                None => warn!("KucoinOracle: Skipping malformed candle {:?}", row),
            }
        }
        debug!("KucoinOracle: {} candles for {} on {}", candles.len(), symbol, date);
        Ok(candles)
    }
}

#[async_trait]
impl PriceOracle for KucoinOracle {
    async fn ping(&self) -> Result<()> {
        let ticker: serde_json::Value = self
            .get(
                "/api/v1/market/orderbook/level1",
                &[("symbol", "BTC-USDT".to_string())],
            )
            .await?;
        debug!("KucoinOracle: ticker {}", ticker);
        Ok(())
    }

    async fn fetch_close_price(&self, symbol: &str, date: NaiveDate) -> Result<PriceLookup> {
        let candles = self.fetch_candles(symbol, date).await?;
        for candle in &candles {
            debug!("{:?}", candle);
        }
        Ok(match close_at(&candles, utc_midnight(date)) {
            Some(price) => {
                info!("{} price at midnight of {}: {}", symbol, date, price);
                PriceLookup::Available(PriceQuote {
                    symbol: symbol.to_string(),
                    date,
                    price,
                })
            }
            None => PriceLookup::Unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn candle(start: i64, close: f64) -> Candle {
        Candle {
            start,
            close,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            volume: Some(1.0),
        }
    }

    #[test]
    fn test_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2022, 2, 5).unwrap();
        assert_eq!(utc_midnight(date), 1644019200);
    }

    #[test]
    fn test_candle_from_row_uses_close_column() {
        let c = Candle::from_row(&row(&[
            "1644019200", "41500.1", "41603.4", "41700.0", "41490.0", "12.5", "520000",
        ]))
        .unwrap();
        assert_eq!(c.start, 1644019200);
        assert_eq!(c.open, Some(41500.1));
        assert_eq!(c.close, 41603.4);
        assert_eq!(c.high, Some(41700.0));
    }

    #[test]
    fn test_candle_from_row_rejects_short_row() {
        assert!(Candle::from_row(&row(&["1644019200", "1.0"])).is_none());
        assert!(Candle::from_row(&row(&["abc", "1", "2", "3", "4", "5"])).is_none());
        assert!(Candle::from_row(&row(&["1644019200", "1", "n/a", "3", "4", "5"])).is_none());
    }

    #[test]
    fn test_candle_tolerates_bad_unused_columns() {
        let c = Candle::from_row(&row(&["1644019200", "", "2.793", "NaN?", "-", "x"])).unwrap();
        assert_eq!(c.close, 2.793);
        assert_eq!(c.open, None);
        assert_eq!(c.volume, None);
        assert_eq!(close_at(&[c], 1644019200), Some(2.793));
    }

    #[test]
    fn test_candle_from_row_close_only() {
        let c = Candle::from_row(&row(&["1644019200", "1", "2.5"])).unwrap();
        assert_eq!(c.close, 2.5);
        assert_eq!(c.high, None);
    }

    #[test]
    fn test_close_at_matches_midnight() {
        let midnight = 1644019200;
        let candles = vec![
            candle(midnight + 600, 3.0),
            candle(midnight + 300, 2.9),
            candle(midnight, 2.793),
            candle(midnight - 300, 2.7),
        ];
        assert_eq!(close_at(&candles, midnight), Some(2.793));
    }

    #[test]
    fn test_close_at_last_match_wins() {
        let midnight = 1644019200;
        let candles = vec![candle(midnight, 1.0), candle(midnight, 2.0)];
        assert_eq!(close_at(&candles, midnight), Some(2.0));
    }

    #[test]
    fn test_close_at_unavailable() {
        let candles = vec![candle(1644019500, 1.0)];
        assert_eq!(close_at(&candles, 1644019200), None);
        assert_eq!(close_at(&[], 1644019200), None);
    }

    #[test]
    fn test_api_response_parse() {
        let body = r#"{"code":"200000","data":[["1644019200","1","2","3","0.5","10","20"]]}"#;
        let parsed: ApiResponse<Vec<Vec<String>>> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.code, SUCCESS_CODE);
        assert_eq!(parsed.data.unwrap().len(), 1);
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = KucoinCredentials {
            api_key: "61f0abcd1234".to_string(),
            api_secret: "topsecret".to_string(),
            api_password: "hunter2".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("***1234"));
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("hunter2"));
    }
}
