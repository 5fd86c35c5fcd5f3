//! Feed source: recent items for a tag, newest first.
//!
//! The polling engine only sees the [`FeedSource`] trait; the concrete
//! [`HttpFeedSource`] talks JSON over HTTP. Tests substitute scripted
//! implementations.

use crate::http::HTTP_CLIENT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// One feed item for a tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedItem {
    /// Ordering watermark (epoch-like, larger is newer).
    pub stamp: i64,
    #[serde(default)]
    pub caption: String,
    pub media_url: String,
}

/// Recent-items response for one tag, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagFeed {
    pub count: i64,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Recent items for a tag, newest first.
    async fn recent(&self, tag: &str) -> Result<TagFeed>;
}

/// JSON-over-HTTP feed client.
pub struct HttpFeedSource {
    base_url: String,
}

impl HttpFeedSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn recent(&self, tag: &str) -> Result<TagFeed> {
        // URL encode the tag to handle special characters
        let url = format!(
            "{}/tags/{}/media/recent",
            self.base_url,
            urlencoding::encode(tag)
        );

        let response = HTTP_CLIENT
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Feed request for #{} failed", tag))?;

        if !response.status().is_success() {
            anyhow::bail!("Feed returned {} for #{}", response.status(), tag);
        }

        let feed: TagFeed = response
            .json()
            .await
            .with_context(|| format!("Failed to decode feed response for #{}", tag))?;

        Ok(feed)
    }
}
