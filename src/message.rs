//! Conversation message types shared across the crate.

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Who produced a message. Serialized lowercase, matching the Ollama wire
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Memory,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Memory => "memory",
        }
    }
}

/// One entry of the conversation log. Immutable once appended; the log is
/// ordered by insertion and never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(local_timestamp()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Local-clock ISO-8601 timestamp with second precision.
///
/// All timestamps in the crate use this one format, so lexicographic
/// comparison matches chronological ordering.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
