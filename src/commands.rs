//! Inbound command handling: `add <tag>`, `del <tag>`, `list`.
//!
//! Each command mutates the watch table (and through it the durable store)
//! and replies to the originating message. Not-watched / already-watched are
//! normal user-facing outcomes; storage failures are logged and their text
//! sent back as the reply.

use crate::notify::Notifier;
use crate::watch::{AddOutcome, DeleteOutcome, WatchTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Del(String),
    List,
}

/// One inbound command, addressed back to its originating message.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender: String,
    pub command: Command,
}

/// Execute a command against the watch table and reply to the sender.
pub async fn handle(table: &WatchTable, notifier: &dyn Notifier, event: CommandEvent) {
    if let Err(e) = table.ensure_chat(event.chat_id) {
        tracing::warn!("Failed to load stored tags for chat {}: {}", event.chat_id, e);
    }

    let reply = match &event.command {
        Command::Add(tag) => {
            tracing::info!("[{}] Add tag #{}", event.sender, tag);
            add_reply(table, event.chat_id, tag)
        }
        Command::Del(tag) => {
            tracing::info!("[{}] Del tag #{}", event.sender, tag);
            del_reply(table, event.chat_id, tag)
        }
        Command::List => {
            tracing::info!("[{}] List tags", event.sender);
            list_reply(table, event.chat_id)
        }
    };

    if let Err(e) = notifier.reply(event.chat_id, event.message_id, &reply).await {
        tracing::warn!("Failed to reply to chat {}: {}", event.chat_id, e);
    }
}

fn add_reply(table: &WatchTable, chat_id: i64, tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() {
        return "Empty tag".to_string();
    }

    match table.add_tag(chat_id, tag) {
        Ok(AddOutcome::Added) => format!("Added tag: {}", tag),
        Ok(AddOutcome::AlreadyWatched) => "Tag already on list".to_string(),
        Err(e) => {
            tracing::error!("Failed to persist tag #{} for chat {}: {}", tag, chat_id, e);
            e.to_string()
        }
    }
}

fn del_reply(table: &WatchTable, chat_id: i64, tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() {
        return "Empty tag".to_string();
    }

    match table.delete_tag(chat_id, tag) {
        Ok(DeleteOutcome::Deleted) => format!("Deleted tag: {}", tag),
        Ok(DeleteOutcome::NotWatched) => "Tag not on list".to_string(),
        Err(e) => {
            tracing::error!("Failed to delete tag #{} for chat {}: {}", tag, chat_id, e);
            e.to_string()
        }
    }
}

fn list_reply(table: &WatchTable, chat_id: i64) -> String {
    let tags = table.list_tags(chat_id);
    if tags.is_empty() {
        return "No hashtags to follow".to_string();
    }

    tags.iter()
        .enumerate()
        .map(|(i, tag)| format!("{} : {}", i + 1, tag))
        .collect::<Vec<_>>()
        .join("\n")
}
