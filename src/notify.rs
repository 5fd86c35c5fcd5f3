//! Notification sink: delivering text to a chat.
//!
//! The core never retries a failed send; errors are logged by the caller
//! and the next poll tick or command produces a fresh attempt if warranted.

use crate::http::HTTP_CLIENT;
use anyhow::{Context, Result};
use async_trait::async_trait;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain message to a chat.
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send a message as a reply to an earlier message in the chat.
    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API sink.
pub struct TelegramNotifier {
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.token);

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(message_id) = reply_to {
            body["reply_to_message_id"] = message_id.into();
        }

        let response = HTTP_CLIENT
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Telegram API error: {}", response.status());
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text, None).await
    }

    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text, Some(reply_to)).await
    }
}
