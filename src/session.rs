//! Conversation session orchestration.
//!
//! One session owns the live message log and wires the leaf components
//! together per turn, in fixed priority order: memory commands, injection
//! check, compression, scoring and storage, the inference call, and the
//! fallback path when that call fails. A session processes turns
//! sequentially; `chat` is not safe to invoke concurrently.

use crate::config::{ConfigLoader, Settings};
use crate::emergency::{EmergencyGuard, SnapshotState};
use crate::memory::{self, LongTermMemory, MemoryEntry};
use crate::message::Message;
use crate::ollama::{ChatBackend, ChatError};
use crate::security::SecuritySystem;
use crate::Result;
use std::path::Path;
use tracing::{debug, info, warn, Instrument};

/// Compression kicks in once the log grows past this many entries.
const COMPRESS_AFTER: usize = 25;

/// A recovery checkpoint is written every Nth processed turn.
const CHECKPOINT_EVERY: usize = 50;

/// How much of the log and store the guard snapshot carries.
const SNAPSHOT_CONVERSATION_TAIL: usize = 20;
const SNAPSHOT_MEMORY_TAIL: usize = 100;

/// Replies longer than this that end mid-sentence get a terminal period.
const REPAIR_MIN_CHARS: usize = 50;

/// Fixed user-visible fallback phrases, one per failure class.
pub const FALLBACK_TIMEOUT: &str =
    "Превышено время ожидания ответа. Протоколы восстановления активированы.";
pub const FALLBACK_CONNECTION: &str =
    "Временная потеря связи. Протоколы восстановления активированы.";
pub const FALLBACK_GENERIC: &str =
    "Ошибка системы: временная неисправность протокола связи.";

/// Synthesized replies for the memory commands.
const REPLY_SAVED: &str = "Записала в долговременную память.";
const REPLY_CLEARED: &str = "Память очищена. Все записи удалены.";

/// Counters surfaced by the stats command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub total_messages: usize,
    pub memory_entries: usize,
    pub important_memories: usize,
}

/// One persona-bound conversation. Owns the log and the long-term store
/// for its lifetime.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    settings: Settings,
    security: SecuritySystem,
    store: LongTermMemory,
    guard: EmergencyGuard,
    history: Vec<Message>,
    message_count: usize,
    span: tracing::Span,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Build a session: load the persona prompt and security config, load
    /// the long-term store, inject stored memories into the system
    /// message (once), and install the crash-safety guard.
    pub async fn new(
        loader: &ConfigLoader,
        data_dir: &Path,
        settings: Settings,
        backend: B,
    ) -> Result<Self> {
        let security = SecuritySystem::new(loader.load_security().await);
        let store =
            LongTermMemory::load(data_dir.join("long_term_memory").join("memory.json")).await;

        let mut system = Message::system(loader.build_system_prompt().await);
        memory::inject_into_system(&mut system, &store);

        let guard = EmergencyGuard::new(data_dir).await?;
        guard.install();

        let span = tracing::info_span!("session", model = %settings.model.name);
        info!(parent: &span, memories = store.len(), "session initialized");

        Ok(Self {
            backend,
            settings,
            security,
            store,
            guard,
            history: vec![system],
            message_count: 0,
            span,
        })
    }

    /// Process one user turn and return the reply the user should see.
    /// Never errors: inference failures map to fixed fallback phrases.
    pub async fn chat(&mut self, user_input: &str) -> String {
        let span = self.span.clone();
        self.chat_turn(user_input).instrument(span).await
    }

    async fn chat_turn(&mut self, user_input: &str) -> String {
        self.message_count += 1;
        if self.message_count % CHECKPOINT_EVERY == 0 {
            self.publish_snapshot();
            if let Err(e) = self.guard.checkpoint().await {
                warn!("periodic checkpoint failed: {e}");
            }
        }

        // 1. Explicit memory commands bypass everything else.
        if let Some(reply) = self.handle_memory_command(user_input).await {
            self.push_exchange(user_input, &reply);
            self.publish_snapshot();
            return reply;
        }

        // 2. Injection triggers bypass scoring and inference.
        if let Some(reply) = self.security.detect_injection(user_input) {
            info!("injection attempt blocked");
            self.push_exchange(user_input, &reply);
            self.publish_snapshot();
            return reply;
        }

        // 3. Keep the live window bounded.
        if self.history.len() > COMPRESS_AFTER {
            let before = self.history.len();
            self.history = memory::compress(&self.history);
            debug!(before, after = self.history.len(), "conversation compressed");
        }

        // 4. Record and score the user message.
        let user_message = Message::user(user_input);
        self.history.push(user_message.clone());
        self.remember_if_important(&user_message).await;

        // 5. Send the short-term window to the model.
        let window = self.settings.memory.short_term_messages;
        let start = self.history.len().saturating_sub(window);
        let reply = match self.backend.chat(&self.history[start..]).await {
            Ok(text) => {
                // 6. Record, score and persist the successful reply.
                let text = repair_truncated(text);
                let assistant_message = Message::assistant(text.clone());
                self.history.push(assistant_message.clone());
                self.remember_if_important(&assistant_message).await;
                if let Err(e) = self.store.save().await {
                    warn!("long-term memory save failed: {e}");
                }
                text
            }
            Err(err) => {
                // 7. The fallback turn reaches the log so the user sees
                // it, but is never scored or stored.
                warn!(error = %err, "inference request failed");
                let fallback = fallback_response(&err);
                self.history.push(Message::assistant(fallback));
                fallback.to_string()
            }
        };

        self.publish_snapshot();
        reply
    }

    /// Check the configured save/show/clear trigger phrases. A match
    /// synthesizes the reply locally.
    async fn handle_memory_command(&mut self, user_input: &str) -> Option<String> {
        let lower = user_input.to_lowercase();
        let commands = &self.settings.commands;

        if commands.show.iter().any(|t| lower.contains(t.as_str())) {
            return Some(memory::memory_summary(&self.store));
        }

        if commands.clear.iter().any(|t| lower.contains(t.as_str())) {
            if let Err(e) = self.store.clear().await {
                warn!("memory clear failed: {e}");
            }
            return Some(REPLY_CLEARED.to_string());
        }

        if commands.save.iter().any(|t| lower.contains(t.as_str())) {
            let entry = MemoryEntry::from_message(
                &Message::user(user_input),
                5,
                memory::MemoryKind::UserRequest,
            );
            if let Err(e) = self.store.append(entry).await {
                warn!("memory save command failed: {e}");
            }
            return Some(REPLY_SAVED.to_string());
        }

        None
    }

    /// Score a message and append it to the long-term store when it
    /// crosses the storage threshold.
    async fn remember_if_important(&mut self, message: &Message) {
        let (importance, kind) = memory::enhanced_score(message);
        if importance >= memory::STORAGE_THRESHOLD {
            debug!(importance, "message qualifies for long-term memory");
            let entry = MemoryEntry::from_message(message, importance, kind);
            if let Err(e) = self.store.append(entry).await {
                warn!("long-term memory append failed: {e}");
            }
        }
    }

    /// Append a user turn and its synthesized reply to the log.
    fn push_exchange(&mut self, user_input: &str, reply: &str) {
        self.history.push(Message::user(user_input));
        self.history.push(Message::assistant(reply));
    }

    /// Hand the guard a fresh point-in-time tail of both collections.
    fn publish_snapshot(&self) {
        let start = self.history.len().saturating_sub(SNAPSHOT_CONVERSATION_TAIL);
        self.guard.publish(SnapshotState {
            conversation_tail: self.history[start..].to_vec(),
            memory_tail: self.store.tail(SNAPSHOT_MEMORY_TAIL),
            message_count: self.history.len(),
        });
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_messages: self.history.len(),
            memory_entries: self.store.len(),
            important_memories: self
                .store
                .entries()
                .iter()
                .filter(|e| e.importance >= memory::SUMMARY_THRESHOLD)
                .count(),
        }
    }

    pub fn memory_summary(&self) -> String {
        memory::memory_summary(&self.store)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn memory(&self) -> &LongTermMemory {
        &self.store
    }

    /// Flush the store before process exit.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.store.save().await
    }
}

/// Map a tagged inference failure to its fixed user-visible phrase.
fn fallback_response(err: &ChatError) -> &'static str {
    match err {
        ChatError::Timeout => FALLBACK_TIMEOUT,
        ChatError::Connection(_) => FALLBACK_CONNECTION,
        ChatError::BadStatus(_) | ChatError::Unexpected(_) => FALLBACK_GENERIC,
    }
}

/// Cosmetic repair of truncated generations: long replies without
/// terminal punctuation get a period.
fn repair_truncated(mut text: String) -> String {
    if !text.ends_with(['.', '!', '?']) && text.chars().count() > REPAIR_MIN_CHARS {
        text.push('.');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_unterminated_reply_gets_a_period() {
        let text = "о".repeat(60);
        assert_eq!(repair_truncated(text.clone()), format!("{text}."));
    }

    #[test]
    fn short_or_terminated_replies_are_untouched() {
        assert_eq!(repair_truncated("норм".to_string()), "норм");
        let terminated = format!("{}!", "о".repeat(60));
        assert_eq!(repair_truncated(terminated.clone()), terminated);
    }

    #[test]
    fn each_failure_class_has_its_own_phrase() {
        assert_eq!(fallback_response(&ChatError::Timeout), FALLBACK_TIMEOUT);
        assert_eq!(
            fallback_response(&ChatError::Connection("refused".into())),
            FALLBACK_CONNECTION
        );
        assert_eq!(fallback_response(&ChatError::BadStatus(500)), FALLBACK_GENERIC);
        assert_eq!(
            fallback_response(&ChatError::Unexpected("shape".into())),
            FALLBACK_GENERIC
        );
    }
}
