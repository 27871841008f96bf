use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::api::binance::{kline_stream_url, KlineEvent};
use crate::models::Candle;
use crate::Result;

const RECONNECT_BASE: Duration = Duration::from_secs(5);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// What the live feed reports to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Candle(Candle),
    Disconnected,
}

/// Reconnect delay: starts at `base`, doubles after each failed attempt up
/// to `max`, and goes back to `base` once a connection succeeds
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RECONNECT_BASE, RECONNECT_MAX)
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Delay to wait now; the following call returns the doubled value
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Live kline websocket subscription with automatic reconnect
///
/// Candle updates (forming and final) are forwarded as they arrive. The
/// consumer decides what to do with them; the feed never touches engine state.
pub struct PriceFeed {
    url: String,
    backoff: Backoff,
}

impl PriceFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: Backoff::default(),
        }
    }

    pub fn binance(ws_base: &str, symbol: &str, interval: &str) -> Self {
        Self::new(kline_stream_url(ws_base, symbol, interval))
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream until the receiving side is dropped
    pub async fn run(mut self, tx: mpsc::Sender<FeedEvent>) {
        loop {
            match self.stream_once(&tx).await {
                Ok(()) => tracing::warn!(url = %self.url, "🔌 WebSocket closed"),
                Err(e) => tracing::error!(url = %self.url, "❌ WebSocket error: {}", e),
            }

            if tx.send(FeedEvent::Disconnected).await.is_err() {
                break;
            }

            let delay = self.backoff.next_delay();
            tracing::info!("🔄 Reconnecting in {:?}...", delay);
            tokio::time::sleep(delay).await;
        }

        tracing::info!(url = %self.url, "Price feed stopped");
    }

    async fn stream_once(&mut self, tx: &mpsc::Sender<FeedEvent>) -> Result<()> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        tracing::info!(url = %self.url, "✅ WebSocket connected");
        self.backoff.reset();

        tx.send(FeedEvent::Connected).await?;

        let (mut write, mut read) = ws_stream.split();

        while let Some(msg_result) = read.next().await {
            match msg_result? {
                Message::Text(text) => {
                    if let Some(candle) = parse_kline_message(&text) {
                        tx.send(FeedEvent::Candle(candle)).await?;
                    }
                }
                Message::Ping(data) => {
                    write.send(Message::Pong(data)).await?;
                }
                Message::Close(frame) => {
                    tracing::info!(?frame, "Server closed the stream");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Extract a candle from a kline stream text frame
pub fn parse_kline_message(text: &str) -> Option<Candle> {
    match serde_json::from_str::<KlineEvent>(text) {
        Ok(event) => event.kline.to_candle(),
        Err(e) => {
            tracing::debug!("Ignoring non-kline message: {}", e);
            None
        }
    }
}
