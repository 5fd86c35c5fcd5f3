//! Telegram update source: long-polls `getUpdates` and forwards recognized
//! bot commands to the command handler as [`CommandEvent`]s.
//!
//! Everything that is not an `/add`, `/del` or `/list` message is ignored.
//! Transport errors are logged and retried after a short pause; the offset
//! only advances past updates that were actually received.

use crate::commands::{Command, CommandEvent};
use crate::http::HTTP_CLIENT;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Long-poll window. Kept under the shared HTTP client's request timeout so
/// an idle poll returns normally instead of erroring out.
const POLL_WINDOW_SECS: u64 = 25;

const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: String,
}

/// Run the update loop until the receiving side goes away.
pub async fn run(token: String, tx: mpsc::Sender<CommandEvent>) {
    let mut offset: i64 = 0;

    loop {
        let updates = match fetch_updates(&token, offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Telegram getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            if let Some(event) = command_event(update) {
                if tx.send(event).await.is_err() {
                    tracing::info!("Command channel closed, stopping update loop");
                    return;
                }
            }
        }
    }
}

async fn fetch_updates(token: &str, offset: i64) -> Result<Vec<Update>> {
    let url = format!(
        "{}/bot{}/getUpdates?timeout={}&offset={}",
        TELEGRAM_API_URL, token, POLL_WINDOW_SECS, offset
    );

    let response = HTTP_CLIENT
        .get(&url)
        .send()
        .await
        .context("Telegram getUpdates request failed")?;

    if !response.status().is_success() {
        anyhow::bail!("Telegram API error: {}", response.status());
    }

    let body: UpdatesResponse = response
        .json()
        .await
        .context("Failed to decode getUpdates response")?;

    if !body.ok {
        anyhow::bail!("Telegram getUpdates returned ok=false");
    }

    Ok(body.result)
}

/// Turn an update into a command event, or `None` if it isn't a recognized
/// bot command.
fn command_event(update: Update) -> Option<CommandEvent> {
    let message = update.message?;
    let text = message.text.as_deref()?;
    let command = parse_command(text)?;

    let sender = message
        .from
        .map(|u| u.username.unwrap_or(u.first_name))
        .unwrap_or_else(|| "unknown".to_string());

    Some(CommandEvent {
        chat_id: message.chat.id,
        message_id: message.message_id,
        sender,
        command,
    })
}

/// Parse a `/command arg...` message. Tolerates a `@botname` suffix on the
/// command and takes only the first whitespace-separated argument.
fn parse_command(text: &str) -> Option<Command> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or(head);
    let arg = args
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    match name {
        "add" => Some(Command::Add(arg)),
        "del" => Some(Command::Del(arg)),
        "list" => Some(Command::List),
        _ => None,
    }
}
