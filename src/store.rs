//! Durable per-chat tag sets backed by an embedded sled tree.
//!
//! Each chat's watched tags are stored as one JSON-encoded set under the
//! chat ID, so the watch list survives restarts. Read-modify-write cycles
//! run inside a sled transaction to serialize concurrent writers per key.

use anyhow::{Context, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::BTreeSet;
use std::path::Path;

/// Durable mapping from chat ID to the set of watched tags.
pub struct TagStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl TagStore {
    /// Open (or create) the store at `path`, using the named tree as the
    /// tag bucket.
    pub fn open(path: &Path, tree_name: &str) -> Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("Failed to open tag store at {}", path.display()))?;
        let tree = db
            .open_tree(tree_name)
            .with_context(|| format!("Failed to open tree {:?}", tree_name))?;
        Ok(Self { db, tree })
    }

    /// All tags stored for a chat. A chat with no record yields an empty set.
    pub fn tags(&self, chat_id: i64) -> Result<BTreeSet<String>> {
        let raw = self
            .tree
            .get(chat_key(chat_id))
            .with_context(|| format!("Failed to read tags for chat {}", chat_id))?;
        decode_tags(raw.as_deref())
            .with_context(|| format!("Failed to decode tags for chat {}", chat_id))
    }

    /// Add a tag to a chat's set. Adding a tag that is already present is a
    /// no-op success.
    pub fn add_tag(&self, chat_id: i64, tag: &str) -> Result<()> {
        let key = chat_key(chat_id);
        self.tree
            .transaction(|tx| {
                let mut tags = decode_tags(tx.get(key)?.as_deref())
                    .map_err(ConflictableTransactionError::Abort)?;
                if tags.insert(tag.to_string()) {
                    tx.insert(&key[..], encode_tags(&tags)?)?;
                }
                Ok(())
            })
            .map_err(flatten_tx_err)
            .with_context(|| format!("Failed to persist tag {:?} for chat {}", tag, chat_id))?;
        self.flush()
    }

    /// Remove a tag from a chat's set. Removing an absent tag is a no-op
    /// success and does not rewrite the record.
    pub fn delete_tag(&self, chat_id: i64, tag: &str) -> Result<()> {
        let key = chat_key(chat_id);
        self.tree
            .transaction(|tx| {
                let mut tags = decode_tags(tx.get(key)?.as_deref())
                    .map_err(ConflictableTransactionError::Abort)?;
                if tags.remove(tag) {
                    tx.insert(&key[..], encode_tags(&tags)?)?;
                }
                Ok(())
            })
            .map_err(flatten_tx_err)
            .with_context(|| format!("Failed to delete tag {:?} for chat {}", tag, chat_id))?;
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().context("Failed to flush tag store")?;
        Ok(())
    }
}

/// Chat IDs are keyed as fixed-width little-endian bytes.
fn chat_key(chat_id: i64) -> [u8; 8] {
    chat_id.to_le_bytes()
}

/// Absent or empty values decode to the empty set, never an error.
fn decode_tags(raw: Option<&[u8]>) -> Result<BTreeSet<String>> {
    match raw {
        Some(buf) if !buf.is_empty() => {
            serde_json::from_slice(buf).context("Stored tag set is not valid JSON")
        }
        _ => Ok(BTreeSet::new()),
    }
}

fn encode_tags(
    tags: &BTreeSet<String>,
) -> std::result::Result<Vec<u8>, ConflictableTransactionError<anyhow::Error>> {
    serde_json::to_vec(tags)
        .map_err(|e| ConflictableTransactionError::Abort(anyhow::Error::from(e)))
}

fn flatten_tx_err(e: TransactionError<anyhow::Error>) -> anyhow::Error {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}
