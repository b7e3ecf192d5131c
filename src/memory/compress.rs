//! Context compression for the live conversation window.
//!
//! Produces an order-preserving subsequence of the log:
//! [system] + [important early identity pairs] + [recent tail]. The tail
//! may repeat an early pair; no de-duplication happens across groups.

use crate::message::{Message, Role};
use tracing::warn;

/// Logs at or below this length are returned unchanged.
const NOOP_LIMIT: usize = 10;

/// How many post-system messages are scanned for identity exchanges.
const EARLY_SCAN_WINDOW: usize = 15;

/// At most this many early user/assistant pairs are kept.
const MAX_EARLY_PAIRS: usize = 4;

/// Length of the recent tail appended after the early pairs.
const RECENT_TAIL: usize = 8;

/// Tail length used when compression itself fails.
const FALLBACK_TAIL: usize = 15;

/// User messages containing one of these qualify as identity exchanges
/// worth keeping from the early conversation.
const IDENTITY_KEYWORDS: &[&str] = &[
    "представься",
    "кто ты",
    "имя",
    "звать",
    "роль",
    "обязанности",
];

/// Compress a conversation log. The leading system message always
/// survives and relative order is preserved. The tail may repeat an early
/// pick; that duplication is intentional.
pub fn compress(history: &[Message]) -> Vec<Message> {
    if history.len() <= NOOP_LIMIT {
        return history.to_vec();
    }

    match try_compress(history) {
        Some(compressed) => compressed,
        None => {
            warn!("context compression failed, falling back to recent tail");
            fallback_tail(history)
        }
    }
}

fn try_compress(history: &[Message]) -> Option<Vec<Message>> {
    let mut compressed = Vec::new();

    let mut offset = 0;
    if history.first()?.role == Role::System {
        compressed.push(history.first()?.clone());
        offset = 1;
    }

    // Identity exchanges from the early conversation, question + reply.
    let scan_end = history.len().min(offset + EARLY_SCAN_WINDOW);
    let mut pairs = 0;
    let mut i = offset;
    while i < scan_end && pairs < MAX_EARLY_PAIRS {
        let message = history.get(i)?;
        if message.role == Role::User && has_identity_keyword(&message.content) {
            compressed.push(message.clone());
            if let Some(reply) = history.get(i + 1) {
                if reply.role == Role::Assistant {
                    compressed.push(reply.clone());
                    i += 1;
                }
            }
            pairs += 1;
        }
        i += 1;
    }

    let tail_start = history.len().saturating_sub(RECENT_TAIL);
    compressed.extend_from_slice(history.get(tail_start..)?);

    Some(compressed)
}

fn has_identity_keyword(content: &str) -> bool {
    let lower = content.to_lowercase();
    IDENTITY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Last-resort truncation: the most recent [`FALLBACK_TAIL`] messages,
/// unmodified.
pub(crate) fn fallback_tail(history: &[Message]) -> Vec<Message> {
    let start = history.len().saturating_sub(FALLBACK_TAIL);
    history[start..].to_vec()
}
