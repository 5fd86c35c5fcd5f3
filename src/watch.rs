//! In-memory watch table: the live view of every chat's tags and polling
//! progress.
//!
//! Structural changes (adding/removing chats or tags) and poll-loop
//! snapshots share one mutex. Progress values themselves are atomics behind
//! an `Arc`, so in-flight feed checks update them without holding the lock;
//! a check racing a concurrent delete just finishes against an entry that is
//! no longer reachable.

use crate::store::TagStore;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Polling cursor for one (chat, tag) pair.
///
/// `last_stamp` is the watermark of the newest item already notified;
/// `count` is the feed's last reported total, informational only.
#[derive(Debug, Default)]
pub struct Progress {
    count: AtomicI64,
    last_stamp: AtomicI64,
}

impl Progress {
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn last_stamp(&self) -> i64 {
        self.last_stamp.load(Ordering::Relaxed)
    }

    /// Record an observation. The watermark only ever moves forward, so a
    /// stale overlapping check cannot rewind it.
    pub fn record(&self, count: i64, stamp: i64) {
        self.count.store(count, Ordering::Relaxed);
        self.last_stamp.fetch_max(stamp, Ordering::Relaxed);
    }
}

/// One snapshotted (chat, tag) pair handed to a feed check.
pub struct WatchEntry {
    pub chat_id: i64,
    pub tag: String,
    pub progress: Arc<Progress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyWatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotWatched,
}

/// Authoritative in-process view of watched tags, kept consistent with the
/// durable [`TagStore`].
pub struct WatchTable {
    store: TagStore,
    inner: Mutex<HashMap<i64, HashMap<String, Arc<Progress>>>>,
}

impl WatchTable {
    pub fn new(store: TagStore) -> Self {
        Self {
            store,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &TagStore {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, HashMap<String, Arc<Progress>>>> {
        // The critical sections never panic, but don't let a poisoned lock
        // take the whole bot down either.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Populate a chat's entry from the durable store if it isn't loaded
    /// yet. Idempotent; no-op for chats already present.
    pub fn ensure_chat(&self, chat_id: i64) -> Result<()> {
        let mut inner = self.lock();
        if inner.contains_key(&chat_id) {
            return Ok(());
        }

        let tags = self.store.tags(chat_id)?;
        let entries = tags
            .into_iter()
            .map(|tag| (tag, Arc::new(Progress::default())))
            .collect();
        inner.insert(chat_id, entries);
        Ok(())
    }

    /// Start watching a tag for a chat.
    ///
    /// The in-memory entry is inserted before the durable write so the next
    /// poll tick picks it up promptly. If persistence fails, the entry is
    /// left in place and the error surfaced; polling an unpersisted tag is
    /// harmless and the divergence heals on restart.
    pub fn add_tag(&self, chat_id: i64, tag: &str) -> Result<AddOutcome> {
        anyhow::ensure!(!tag.trim().is_empty(), "Empty tag");

        let mut inner = self.lock();
        let chat = inner.entry(chat_id).or_default();
        if chat.contains_key(tag) {
            return Ok(AddOutcome::AlreadyWatched);
        }

        chat.insert(tag.to_string(), Arc::new(Progress::default()));
        self.store.add_tag(chat_id, tag)?;
        Ok(AddOutcome::Added)
    }

    /// Stop watching a tag. The in-memory entry is removed only after the
    /// durable delete succeeds.
    pub fn delete_tag(&self, chat_id: i64, tag: &str) -> Result<DeleteOutcome> {
        let mut inner = self.lock();
        let Some(chat) = inner.get_mut(&chat_id) else {
            return Ok(DeleteOutcome::NotWatched);
        };
        if !chat.contains_key(tag) {
            return Ok(DeleteOutcome::NotWatched);
        }

        self.store.delete_tag(chat_id, tag)?;
        chat.remove(tag);
        Ok(DeleteOutcome::Deleted)
    }

    /// Tags watched by a chat, in stable (sorted) order for display.
    pub fn list_tags(&self, chat_id: i64) -> Vec<String> {
        let inner = self.lock();
        let mut tags: Vec<String> = inner
            .get(&chat_id)
            .map(|chat| chat.keys().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Snapshot every live (chat, tag) pair for one poll tick. Only clones
    /// handles; the lock is released before any check runs.
    pub fn snapshot(&self) -> Vec<WatchEntry> {
        let inner = self.lock();
        let mut entries = Vec::new();
        for (&chat_id, chat) in inner.iter() {
            for (tag, progress) in chat {
                entries.push(WatchEntry {
                    chat_id,
                    tag: tag.clone(),
                    progress: Arc::clone(progress),
                });
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn table(dir: &TempDir) -> WatchTable {
        let store = TagStore::open(&dir.path().join("tags.db"), "tags").unwrap();
        WatchTable::new(store)
    }

    #[test]
    fn test_added_tag_is_listed_until_deleted() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        assert_eq!(table.add_tag(42, "cats").unwrap(), AddOutcome::Added);
        assert_eq!(table.list_tags(42), vec!["cats"]);

        assert_eq!(table.delete_tag(42, "cats").unwrap(), DeleteOutcome::Deleted);
        assert!(table.list_tags(42).is_empty());
    }

    #[test]
    fn test_double_add_reports_already_watched() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        assert_eq!(table.add_tag(42, "cats").unwrap(), AddOutcome::Added);
        assert_eq!(
            table.add_tag(42, "cats").unwrap(),
            AddOutcome::AlreadyWatched
        );

        assert_eq!(table.list_tags(42), vec!["cats"]);
        assert_eq!(table.store().tags(42).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_unwatched_reports_not_watched() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        assert_eq!(
            table.delete_tag(42, "cats").unwrap(),
            DeleteOutcome::NotWatched
        );
        assert!(table.store().tags(42).unwrap().is_empty());

        table.add_tag(42, "dogs").unwrap();
        assert_eq!(
            table.delete_tag(42, "cats").unwrap(),
            DeleteOutcome::NotWatched
        );
        assert_eq!(table.store().tags(42).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        assert!(table.add_tag(42, "").is_err());
        assert!(table.add_tag(42, "   ").is_err());
        assert!(table.list_tags(42).is_empty());
    }

    #[test]
    fn test_ensure_chat_rebuilds_from_store() {
        let dir = TempDir::new().unwrap();

        {
            let table = table(&dir);
            table.add_tag(42, "cats").unwrap();
            table.add_tag(42, "dogs").unwrap();
        }

        // Fresh table over the same store, as after a restart.
        let table = table(&dir);
        assert!(table.list_tags(42).is_empty());

        table.ensure_chat(42).unwrap();
        assert_eq!(table.list_tags(42), vec!["cats", "dogs"]);

        // Progress starts from zero after a rebuild.
        let entries = table.snapshot();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.progress.last_stamp() == 0));
    }

    #[test]
    fn test_ensure_chat_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        table.ensure_chat(42).unwrap();
        table.add_tag(42, "cats").unwrap();
        table.snapshot()[0].progress.record(10, 100);

        // A second ensure must not reset live progress.
        table.ensure_chat(42).unwrap();
        assert_eq!(table.snapshot()[0].progress.last_stamp(), 100);
    }

    #[test]
    fn test_snapshot_covers_all_chats() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);

        table.add_tag(1, "cats").unwrap();
        table.add_tag(1, "dogs").unwrap();
        table.add_tag(2, "birds").unwrap();

        let mut pairs: Vec<(i64, String)> = table
            .snapshot()
            .into_iter()
            .map(|e| (e.chat_id, e.tag))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (1, "cats".to_string()),
                (1, "dogs".to_string()),
                (2, "birds".to_string()),
            ]
        );
    }

    #[test]
    fn test_snapshot_shares_progress_with_table() {
        let dir = TempDir::new().unwrap();
        let table = table(&dir);
        table.add_tag(42, "cats").unwrap();

        let entry = &table.snapshot()[0];
        entry.progress.record(7, 100);

        // A later snapshot of the same entry sees the update.
        assert_eq!(table.snapshot()[0].progress.last_stamp(), 100);
        assert_eq!(table.snapshot()[0].progress.count(), 7);
    }

    #[test]
    fn test_progress_watermark_never_decreases() {
        let progress = Progress::default();

        progress.record(5, 100);
        progress.record(3, 80);

        assert_eq!(progress.last_stamp(), 100);
        // Count is informational and takes the latest observation.
        assert_eq!(progress.count(), 3);
    }
}
