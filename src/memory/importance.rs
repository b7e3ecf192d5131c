//! Lexical importance scoring for long-term memory decisions.
//!
//! Two passes exist. `score` is the weighted keyword sum used as the base
//! heuristic. `enhanced_score` checks three priority-ordered pattern
//! classes first and only falls back to the base sum when none match; it
//! also decides whether an entry counts as an explicit user request.

use crate::memory::MemoryKind;
use crate::message::Message;

/// Trigger vocabulary and weights. Overlapping triggers all count; there
/// is no early exit.
const TRIGGER_WEIGHTS: &[(&str, u32)] = &[
    ("кьяра", 3),
    ("снежная мека", 3),
    ("госпожа", 2),
    ("фабрика", 2),
    ("память", 2),
    ("вспомни", 2),
    ("запомни", 2),
    ("важно", 1),
    ("имя", 1),
    ("представься", 1),
    ("роль", 1),
];

/// Class (a): explicit remember-request phrasing.
const REMEMBER_PHRASES: &[&str] = &["запомни", "не забудь", "сохрани в памяти"];

/// Class (b): tracked important objects.
const IMPORTANT_OBJECTS: &[&str] = &["кьяра", "снежная мека", "госпожа", "фабрика"];

/// Class (c): references to a past conversation.
const PAST_REFERENCES: &[&str] = &["в прошлый раз", "помнишь", "вспомни"];

/// A message qualifies for long-term storage at this score.
pub const STORAGE_THRESHOLD: u32 = 2;

/// Entries shown in the memory summary need at least this importance.
/// Deliberately distinct from [`STORAGE_THRESHOLD`].
pub const SUMMARY_THRESHOLD: u8 = 3;

/// Base importance: sum of trigger weights found in the lowercased
/// content, plus one for a question. An empty message scores 0.
pub fn score(message: &Message) -> u32 {
    let content = message.content.to_lowercase();
    let mut total: u32 = TRIGGER_WEIGHTS
        .iter()
        .filter(|(trigger, _)| content.contains(trigger))
        .map(|(_, weight)| weight)
        .sum();

    if content.contains('?') {
        total += 1;
    }
    total
}

/// Enhanced importance: the first matching pattern class wins outright,
/// otherwise the base score (capped at 5) is used.
pub fn enhanced_score(message: &Message) -> (u32, MemoryKind) {
    let content = message.content.to_lowercase();

    if REMEMBER_PHRASES.iter().any(|p| content.contains(p)) {
        return (5, MemoryKind::UserRequest);
    }
    if IMPORTANT_OBJECTS.iter().any(|p| content.contains(p)) {
        return (4, MemoryKind::AutoSave);
    }
    if PAST_REFERENCES.iter().any(|p| content.contains(p)) {
        return (3, MemoryKind::AutoSave);
    }

    (score(message).min(5), MemoryKind::AutoSave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn user(content: &str) -> Message {
        Message::new(Role::User, content)
    }

    #[test]
    fn base_score_sums_all_triggers() {
        // "важно" (1) + "память" (2)
        assert_eq!(score(&user("важно сохранить в память")), 3);
    }

    #[test]
    fn question_mark_adds_one() {
        assert_eq!(score(&user("какая у тебя роль?")), 2);
        assert_eq!(score(&user("какая у тебя роль")), 1);
    }

    #[test]
    fn empty_message_scores_zero() {
        assert_eq!(score(&user("")), 0);
        assert_eq!(score(&user("привет")), 0);
    }

    #[test]
    fn adding_triggers_never_decreases_score() {
        let mut content = String::from("обычное сообщение");
        let mut previous = score(&user(&content));
        for (trigger, _) in super::TRIGGER_WEIGHTS {
            content.push(' ');
            content.push_str(trigger);
            let current = score(&user(&content));
            assert!(current >= previous, "score dropped after adding {trigger}");
            previous = current;
        }
    }

    #[test]
    fn remember_request_scores_five() {
        let (importance, kind) = enhanced_score(&user("Запомни что встреча в 15:00"));
        assert_eq!(importance, 5);
        assert_eq!(kind, MemoryKind::UserRequest);
    }

    #[test]
    fn important_object_scores_four() {
        let (importance, kind) = enhanced_score(&user("Как дела на фабрике?"));
        assert_eq!(importance, 4);
        assert_eq!(kind, MemoryKind::AutoSave);
    }

    #[test]
    fn past_reference_scores_three() {
        let (importance, kind) = enhanced_score(&user("помнишь наш разговор о чае"));
        assert_eq!(importance, 3);
        assert_eq!(kind, MemoryKind::AutoSave);
    }

    #[test]
    fn fallback_uses_capped_base_score() {
        let (importance, kind) = enhanced_score(&user("привет"));
        assert_eq!(importance, 0);
        assert_eq!(kind, MemoryKind::AutoSave);
    }

    #[test]
    fn class_priority_is_fixed() {
        // Mentions both a remember phrase and an important object;
        // class (a) wins.
        let (importance, kind) = enhanced_score(&user("запомни что сказала госпожа"));
        assert_eq!(importance, 5);
        assert_eq!(kind, MemoryKind::UserRequest);
    }
}
