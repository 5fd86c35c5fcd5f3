//! Periodic poll loop and per-tag feed checks.
//!
//! Every tick the loop snapshots the watch table under its lock, releases
//! it, and spawns one task per (chat, tag) pair. Checks from consecutive
//! ticks may overlap on the same progress entry; the watermark only moves
//! forward, so at worst a stale check delays one notification.

use crate::feed::FeedSource;
use crate::notify::Notifier;
use crate::watch::{Progress, WatchTable};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use url::Url;

/// Fixed-interval scheduler over the watch table.
pub struct Poller {
    table: Arc<WatchTable>,
    feed: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    check_timeout: Duration,
}

impl Poller {
    pub fn new(
        table: Arc<WatchTable>,
        feed: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            table,
            feed,
            notifier,
            interval,
            check_timeout,
        }
    }

    /// Drive the poll loop forever.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            for entry in self.table.snapshot() {
                let feed = Arc::clone(&self.feed);
                let notifier = Arc::clone(&self.notifier);
                let check_timeout = self.check_timeout;
                tokio::spawn(async move {
                    check_tag(
                        feed.as_ref(),
                        notifier.as_ref(),
                        entry.chat_id,
                        &entry.tag,
                        &entry.progress,
                        check_timeout,
                    )
                    .await;
                });
            }
        }
    }
}

/// One feed check for one (chat, tag) pair.
///
/// Queries the feed, applies the dedup rule against the progress watermark,
/// and notifies the chat about the newest item. Query failures and timeouts
/// leave progress untouched; the next tick retries naturally.
pub async fn check_tag(
    feed: &dyn FeedSource,
    notifier: &dyn Notifier,
    chat_id: i64,
    tag: &str,
    progress: &Progress,
    check_timeout: Duration,
) {
    let recent = match tokio::time::timeout(check_timeout, feed.recent(tag)).await {
        Ok(Ok(recent)) => recent,
        Ok(Err(e)) => {
            tracing::warn!("Feed check for #{} failed: {}", tag, e);
            return;
        }
        Err(_) => {
            tracing::warn!("Feed check for #{} timed out", tag);
            return;
        }
    };

    let Some(newest) = recent.items.first() else {
        tracing::debug!("No items for #{}", tag);
        return;
    };

    if newest.stamp <= progress.last_stamp() {
        tracing::debug!("Nothing new for #{} since {}", tag, progress.last_stamp());
        return;
    }

    // Advance before notifying so a failed send cannot re-fire next tick.
    progress.record(recent.count, newest.stamp);

    let media = match Url::parse(&newest.media_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(
                "Skipping #{} item with bad media URL {:?}: {}",
                tag,
                newest.media_url,
                e
            );
            return;
        }
    };

    let text = format!("{}\n\n{}", newest.caption, media);
    if let Err(e) = notifier.send(chat_id, &text).await {
        tracing::warn!("Failed to notify chat {} about #{}: {}", chat_id, tag, e);
    }
}
