//! Tagwatch - Telegram bot that watches feed tags and notifies chats
//!
//! This library crate exposes internal modules for integration testing.

pub mod commands;
pub mod config;
pub mod feed;
pub mod http;
pub mod notify;
pub mod poller;
pub mod store;
pub mod telegram;
pub mod watch;
