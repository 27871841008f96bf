use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::{DeliveryReport, NotificationSink};
use crate::Result;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const MESSAGES_PER_SECOND: u32 = 20;

type TelegramRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A chat that has messaged the bot, as seen in `getUpdates`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub first_name: Option<String>,
    pub title: Option<String>,
}

impl ChatInfo {
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdateMessage {
    chat: ChatInfo,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Delivers messages through the Telegram Bot API `sendMessage` method
///
/// Cloning shares the HTTP client and the rate limiter.
#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    base_url: String,
    bot_token: String,
    rate_limiter: Arc<TelegramRateLimiter>,
}

impl TelegramSink {
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bot_token, TELEGRAM_API_BASE)
    }

    /// Point the sink at another API host (used against mock servers)
    pub fn with_base_url(bot_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let per_second = NonZeroU32::new(MESSAGES_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            rate_limiter,
        })
    }

    /// Chats found in pending bot updates, first occurrence order, deduplicated
    ///
    /// Used to discover the ids to put in `chat_ids`.
    pub async fn recent_chats(&self) -> Result<Vec<ChatInfo>> {
        let url = format!("{}/bot{}/getUpdates", self.base_url, self.bot_token);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("Telegram API error ({}): {}", status, body).into());
        }

        let updates: UpdatesResponse = response.json().await?;
        let mut chats: Vec<ChatInfo> = Vec::new();
        for chat in updates.result.into_iter().filter_map(|u| u.message).map(|m| m.chat) {
            if !chats.iter().any(|c| c.id == chat.id) {
                chats.push(chat);
            }
        }

        tracing::debug!(count = chats.len(), "Fetched Telegram chats");
        Ok(chats)
    }

    async fn send_one(&self, chat_id: &str, text: &str) -> Result<()> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("Telegram API error ({}): {}", status, body).into());
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, text: &str, recipients: &[String]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for chat_id in recipients {
            match self.send_one(chat_id, text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(chat_id = %chat_id, "❌ Failed to send Telegram message: {}", e);
                }
            }
        }

        report
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
