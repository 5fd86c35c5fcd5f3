#![allow(dead_code)]
//! Test doubles for the feed source and notification sink.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tagwatch::feed::{FeedItem, FeedSource, TagFeed};
use tagwatch::notify::Notifier;

/// Build a feed response from (stamp, caption, media_url) triples,
/// newest first.
pub fn tag_feed(count: i64, items: &[(i64, &str, &str)]) -> TagFeed {
    TagFeed {
        count,
        items: items
            .iter()
            .map(|(stamp, caption, media_url)| FeedItem {
                stamp: *stamp,
                caption: caption.to_string(),
                media_url: media_url.to_string(),
            })
            .collect(),
    }
}

/// Feed source that returns queued responses in order.
#[derive(Default)]
pub struct ScriptedFeed {
    responses: Mutex<VecDeque<Result<TagFeed>>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, feed: TagFeed) {
        self.responses.lock().unwrap().push_back(Ok(feed));
    }

    pub fn push_err(&self, msg: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("{}", msg)));
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn recent(&self, _tag: &str) -> Result<TagFeed> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted feed response")))
    }
}

/// Notification sink that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
    replies: Mutex<Vec<(i64, i64, String)>>,
    fail_sends: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `send` calls fail until turned off again.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(i64, i64, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn last_reply_text(&self) -> Option<String> {
        self.replies.lock().unwrap().last().map(|(_, _, t)| t.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::Relaxed) {
            anyhow::bail!("simulated send failure");
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((chat_id, reply_to, text.to_string()));
        Ok(())
    }
}
