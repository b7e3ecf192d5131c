//! Long-term memory store persisted as a single JSON file.
//!
//! Append-mostly and capacity-bounded: `save` truncates to the newest
//! [`MAX_ENTRIES`] entries and rewrites the file wholesale. Persistence is
//! immediate for user-requested entries and opportunistic for auto-saved
//! ones, so callers must treat auto-entry durability as eventual.

use crate::message::{local_timestamp, Message};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Hard cap on stored entries. Older entries past the cap are dropped
/// silently on save; this is a lossy cap, not an archive.
pub const MAX_ENTRIES: usize = 200;

/// Auto-detected entries trigger a save on every Nth append...
const AUTO_SAVE_EVERY: usize = 5;

/// ...and only when at least this important.
const AUTO_SAVE_MIN_IMPORTANCE: u8 = 3;

/// How an entry entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    AutoSave,
    UserRequest,
}

/// One stored memory excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: String,
    pub content: String,
    pub role: String,
    pub importance: u8,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
}

impl MemoryEntry {
    pub fn from_message(message: &Message, importance: u32, kind: MemoryKind) -> Self {
        Self {
            timestamp: message
                .timestamp
                .clone()
                .unwrap_or_else(local_timestamp),
            content: message.content.clone(),
            role: message.role.as_str().to_string(),
            importance: importance.min(5) as u8,
            kind,
        }
    }
}

/// Durable, capacity-bounded collection of scored message excerpts. Sole
/// writer of its backing file.
pub struct LongTermMemory {
    file_path: PathBuf,
    entries: Vec<MemoryEntry>,
}

impl LongTermMemory {
    /// Load the store from disk. A missing file yields an empty store; a
    /// corrupt file is logged and yields an empty store. Never fails.
    pub async fn load(file_path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&file_path).await {
            Ok(text) => match serde_json::from_str::<Vec<MemoryEntry>>(&text) {
                Ok(entries) => {
                    info!(count = entries.len(), "loaded long-term memory");
                    entries
                }
                Err(e) => {
                    warn!(
                        "corrupt memory file {}: {}, starting empty",
                        file_path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "could not read memory file {}: {}, starting empty",
                    file_path.display(),
                    e
                );
                Vec::new()
            }
        };

        Self { file_path, entries }
    }

    /// Append an entry. User-requested entries are persisted immediately;
    /// auto-saved ones on every [`AUTO_SAVE_EVERY`]th entry when important
    /// enough. The modulus check can skip save points when appends come in
    /// bursts; that gap is accepted as best-effort.
    pub async fn append(&mut self, entry: MemoryEntry) -> Result<()> {
        let user_initiated = entry.kind == MemoryKind::UserRequest;
        let important = entry.importance >= AUTO_SAVE_MIN_IMPORTANCE;
        self.entries.push(entry);

        if user_initiated || (self.entries.len() % AUTO_SAVE_EVERY == 0 && important) {
            self.save().await?;
        }
        Ok(())
    }

    /// Truncate to capacity and rewrite the whole backing file as indented
    /// JSON.
    pub async fn save(&mut self) -> Result<()> {
        if self.entries.len() > MAX_ENTRIES {
            let dropped = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..dropped);
            debug!(dropped, "long-term memory truncated to capacity");
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.file_path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Drop all entries and persist the empty collection immediately.
    pub async fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save().await
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of the most recent `n` entries, for snapshots.
    pub fn tail(&self, n: usize) -> Vec<MemoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
