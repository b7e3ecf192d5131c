//! Folding stored memories back into the live context.
//!
//! `inject_into_system` runs once at session initialization, not per turn.
//! The rendered block is appended to the system message under a fixed
//! header; an empty store produces no mutation at all.

use crate::memory::importance::SUMMARY_THRESHOLD;
use crate::memory::store::{LongTermMemory, MemoryEntry};
use crate::message::Message;

/// Entries need at least this importance to be injected.
const INJECT_THRESHOLD: u8 = 2;

/// At most this many entries are injected, newest first.
const MAX_INJECTED: usize = 15;

/// At most this many entries appear in the user-facing summary.
const MAX_SUMMARIZED: usize = 10;

pub const MEMORY_HEADER: &str = "ВАЖНЫЕ ВОСПОМИНАНИЯ ИЗ ПРОШЛЫХ РАЗГОВОРОВ:";

/// Render the injectable memory block: importance >= 2, newest first,
/// capped at 15 lines. Empty store renders to an empty string.
pub fn build_memory_context(store: &LongTermMemory) -> String {
    let mut important: Vec<&MemoryEntry> = store
        .entries()
        .iter()
        .filter(|e| e.importance >= INJECT_THRESHOLD)
        .collect();

    // Timestamps share one format, so lexicographic order is
    // chronological.
    important.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    important.truncate(MAX_INJECTED);

    important
        .iter()
        .map(|e| format!("- {} ({})", e.content, minute_precision(&e.timestamp)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append the memory block to the system message. Called exactly once per
/// session; a fresh store leaves the prompt untouched.
pub fn inject_into_system(system: &mut Message, store: &LongTermMemory) {
    let block = build_memory_context(store);
    if block.is_empty() {
        return;
    }

    system.content.push_str("\n\n");
    system.content.push_str(MEMORY_HEADER);
    system.content.push('\n');
    system.content.push_str(&block);
}

/// Human-readable store overview for the memory command.
pub fn memory_summary(store: &LongTermMemory) -> String {
    if store.is_empty() {
        return "Долговременная память пуста.".to_string();
    }

    let mut important: Vec<&MemoryEntry> = store
        .entries()
        .iter()
        .filter(|e| e.importance >= SUMMARY_THRESHOLD)
        .collect();
    important.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut summary = format!(
        "Всего записей: {}, важных: {}\n",
        store.len(),
        important.len()
    );
    for entry in important.iter().take(MAX_SUMMARIZED) {
        summary.push_str(&format!(
            "- {} ({})\n",
            entry.content,
            minute_precision(&entry.timestamp)
        ));
    }
    summary
}

fn minute_precision(timestamp: &str) -> &str {
    // "2025-08-31T15:04:05" -> "2025-08-31T15:04"
    timestamp.get(..16).unwrap_or(timestamp)
}
