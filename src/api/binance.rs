use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::models::Candle;
use crate::Result;

pub const BINANCE_REST_BASE: &str = "https://api.binance.com";
pub const BINANCE_WS_BASE: &str = "wss://stream.binance.com:9443";
const MAX_RETRIES: u32 = 3;

/// Binance spot REST client used for history backfill
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_REST_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the most recent `limit` klines, oldest first
    ///
    /// Rows that do not parse are skipped. A kline whose close time has not
    /// passed yet is returned with `is_final == false`.
    pub async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.get(&url).query(&query).send().await {
                Ok(response) if response.status().is_success() => break response,
                Ok(response)
                    if attempt < MAX_RETRIES
                        && (response.status().as_u16() == 429 || response.status().is_server_error()) =>
                {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(
                        "Binance returned {}, retrying in {}s (attempt {}/{})",
                        response.status(),
                        backoff_secs,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(format!("Binance klines error ({}): {}", status, body).into());
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(
                        "Network error: {}, retrying in {}s (attempt {}/{})",
                        e,
                        backoff_secs,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let rows: Vec<Value> = response.json().await?;
        let now = Utc::now();
        let candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline_row(row, now)).collect();

        if candles.len() < rows.len() {
            tracing::warn!(
                symbol,
                skipped = rows.len() - candles.len(),
                "Skipped unparseable kline rows"
            );
        }

        tracing::info!(symbol, interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }
}

/// Parse one REST kline row `[openTime, "o", "h", "l", "c", "v", closeTime, ...]`
pub fn parse_kline_row(row: &Value, now: DateTime<Utc>) -> Option<Candle> {
    let arr = row.as_array()?;
    if arr.len() < 7 {
        return None;
    }

    let open_time = ts_ms_to_utc(arr[0].as_i64()?)?;
    let close_time = ts_ms_to_utc(arr[6].as_i64()?)?;

    Some(Candle {
        timestamp: open_time,
        open: arr[1].as_str()?.parse().ok()?,
        high: arr[2].as_str()?.parse().ok()?,
        low: arr[3].as_str()?.parse().ok()?,
        close: arr[4].as_str()?.parse().ok()?,
        volume: arr[5].as_str()?.parse().ok()?,
        is_final: close_time < now,
    })
}

fn ts_ms_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Websocket stream URL for one symbol's klines
pub fn kline_stream_url(ws_base: &str, symbol: &str, interval: &str) -> String {
    format!(
        "{}/ws/{}@kline_{}",
        ws_base.trim_end_matches('/'),
        symbol.to_lowercase(),
        interval
    )
}

/// Kline stream event; only the `k` payload is used
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "x")]
    pub is_final: bool,
}

impl KlinePayload {
    /// Convert to a candle; unparseable prices become NaN so the engine drops them
    pub fn to_candle(&self) -> Option<Candle> {
        let price = |s: &str| s.parse::<f64>().unwrap_or(f64::NAN);

        Some(Candle {
            timestamp: ts_ms_to_utc(self.open_time)?,
            open: price(&self.open),
            high: price(&self.high),
            low: price(&self.low),
            close: price(&self.close),
            volume: price(&self.volume),
            is_final: self.is_final,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = json!([
            1_700_000_000_000i64,
            "37000.10",
            "37100.00",
            "36950.50",
            "37050.25",
            "12.5",
            1_700_000_059_999i64,
            "463000.0",
            100,
            "6.0",
            "222000.0",
            "0"
        ]);

        let now = Utc.timestamp_millis_opt(1_700_000_100_000).unwrap();
        let candle = parse_kline_row(&row, now).unwrap();
        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candle.open, 37000.10);
        assert_eq!(candle.high, 37100.0);
        assert_eq!(candle.low, 36950.5);
        assert_eq!(candle.close, 37050.25);
        assert_eq!(candle.volume, 12.5);
        assert!(candle.is_final);

        // Still open at `now`
        let early = Utc.timestamp_millis_opt(1_700_000_030_000).unwrap();
        assert!(!parse_kline_row(&row, early).unwrap().is_final);
    }

    #[test]
    fn test_bad_rows_rejected() {
        let now = Utc::now();
        assert!(parse_kline_row(&json!([1, "1", "2"]), now).is_none());
        assert!(parse_kline_row(&json!({"t": 1}), now).is_none());
        assert!(parse_kline_row(&json!([1, "x", "2", "0", "1", "1", 2]), now).is_none());
    }

    #[test]
    fn test_kline_event_deserialize() {
        let raw = r#"{
            "e": "kline", "E": 1700000001000, "s": "BTCUSDT",
            "k": {
                "t": 1700000000000, "T": 1700000059999, "s": "BTCUSDT", "i": "1m",
                "f": 100, "L": 200, "o": "37000.1", "c": "37050.2", "h": "37100.0",
                "l": "36950.5", "v": "12.5", "n": 100, "x": true, "q": "1.0",
                "V": "500", "Q": "0.500", "B": "123456"
            }
        }"#;

        let event: KlineEvent = serde_json::from_str(raw).unwrap();
        let candle = event.kline.to_candle().unwrap();
        assert!(candle.is_final);
        assert_eq!(candle.close, 37050.2);
        assert!(candle.is_well_formed());
    }

    #[test]
    fn test_unparseable_price_becomes_nan() {
        let payload = KlinePayload {
            open_time: 0,
            open: "1".into(),
            high: "bad".into(),
            low: "1".into(),
            close: "1".into(),
            volume: "1".into(),
            is_final: true,
        };
        assert!(!payload.to_candle().unwrap().is_well_formed());
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            kline_stream_url("wss://stream.binance.com:9443/", "BTCUSDT", "1m"),
            "wss://stream.binance.com:9443/ws/btcusdt@kline_1m"
        );
    }

    #[tokio::test]
    async fn test_fetch_klines_from_mock() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                mockito::Matcher::UrlEncoded("interval".into(), "1m".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(
                json!([
                    [60_000, "1.0", "2.0", "0.5", "1.5", "10", 119_999],
                    [120_000, "1.5", "2.5", "1.0", "2.0", "11", 179_999]
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url()).unwrap();
        let candles = client.fetch_klines("btcusdt", "1m", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 2.0);
        assert!(candles.iter().all(|c| c.is_final));
    }

    #[tokio::test]
    async fn test_fetch_klines_client_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url()).unwrap();
        let err = client.fetch_klines("NOPE", "1m", 2).await.unwrap_err();
        assert!(err.to_string().contains("Invalid symbol"));
    }

    #[tokio::test]
    #[ignore] // Requires live API
    async fn test_fetch_klines_live() {
        let client = BinanceClient::new().unwrap();
        let candles = client.fetch_klines("BTCUSDT", "1m", 23).await.unwrap();
        assert_eq!(candles.len(), 23);
    }
}
