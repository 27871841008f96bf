// Notification delivery: sinks and the fire-and-forget dispatcher
pub mod messages;
pub mod telegram;

pub use telegram::{ChatInfo, TelegramSink};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

const QUEUE_CAPACITY: usize = 64;

/// Outcome of one `send` across all recipients
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Destination for bot messages
///
/// Failures are isolated per recipient and reported, never returned as errors.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str, recipients: &[String]) -> DeliveryReport;

    fn name(&self) -> &str;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, text: &str, recipients: &[String]) -> DeliveryReport {
        tracing::info!(recipients = recipients.len(), "📨 {}", text);
        DeliveryReport {
            delivered: recipients.len().max(1),
            failed: 0,
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Non-blocking handle for queueing messages
///
/// Messages are delivered in order by a background task; callers never wait
/// on network I/O. The queue is bounded: when the sink falls behind, new
/// messages are dropped and logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<String>,
}

impl Notifier {
    /// Start the delivery task for `sink`
    pub fn spawn(
        sink: Arc<dyn NotificationSink>,
        recipients: Vec<String>,
    ) -> (Self, JoinHandle<()>) {
        let (notifier, mut rx) = Self::channel();

        let handle = tokio::spawn(async move {
            tracing::info!(sink = sink.name(), recipients = recipients.len(), "Notifier started");

            while let Some(text) = rx.recv().await {
                let report = sink.send(&text, &recipients).await;
                if report.failed > 0 {
                    tracing::warn!(
                        sink = sink.name(),
                        delivered = report.delivered,
                        failed = report.failed,
                        "Message not delivered to every recipient"
                    );
                }
            }

            tracing::info!(sink = sink.name(), "Notifier stopped");
        });

        (notifier, handle)
    }

    /// Notifier backed by a plain channel, for callers that drain it themselves
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn notify(&self, text: impl Into<String>) {
        match self.tx.try_send(text.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => {
                tracing::warn!(queued = self.tx.max_capacity(), "Notification queue full, dropped: {}", text)
            }
            Err(TrySendError::Closed(_)) => tracing::warn!("Notifier closed, message dropped"),
        }
    }
}
