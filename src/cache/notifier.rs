/**
 * Fire-and-forget alerting
 *
 * The refresh path hands messages to a bounded queue and moves on; a
 * separate task drains the queue into an `AlertSink`.
 */
use super::config::NOTIFICATION_CHANNEL_CAPACITY;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, message: &str) -> Result<()> {
        warn!(target: "alert", "{message}");
        Ok(())
    }
}

/// Posts alerts to a Slack-compatible incoming webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

impl WebhookSink {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, message: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&WebhookPayload { text: message })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Cheap, cloneable handle the refresh path uses to raise alerts.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<String>,
}

impl Notifier {
    /// A notifier plus the receiving end of its queue, for wiring a custom consumer.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue `message` without waiting. Dropped with a warning if the queue is full.
    pub fn notify(&self, message: impl Into<String>) {
        match self.tx.try_send(message.into()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!("alert queue full, dropping: {}", message);
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!("alert consumer gone, dropping: {}", message);
            }
        }
    }
}

/// Start the task that drains alerts into `sink`. The task ends once every
/// `Notifier` clone has been dropped.
#[must_use]
pub fn spawn_notifier(sink: Arc<dyn AlertSink>) -> (Notifier, JoinHandle<()>) {
    let (notifier, mut rx) = Notifier::channel(NOTIFICATION_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(&message).await {
                error!("failed to deliver alert: {}", e);
            }
        }
        debug!("alert queue closed");
    });
    (notifier, handle)
}
