//! Nicole - persona chat for local Ollama models
//!
//! A character-bound chat front-end that:
//! - Keeps the live conversation window bounded via context compression
//! - Persists a long-term memory of important exchanges across sessions
//! - Guards in-flight state against abrupt termination

pub mod config;
pub mod emergency;
pub mod memory;
pub mod message;
pub mod ollama;
pub mod security;
pub mod session;

pub use config::{ConfigLoader, Settings};
pub use emergency::{EmergencyGuard, EmergencySnapshot};
pub use memory::{LongTermMemory, MemoryEntry, MemoryKind};
pub use message::{Message, Role};
pub use ollama::{ChatBackend, ChatError, OllamaClient};
pub use security::SecuritySystem;
pub use session::{ChatSession, SessionStats};

/// Result type for Nicole operations
pub type Result<T> = std::result::Result<T, NicoleError>;

/// Errors that can occur in Nicole
#[derive(Debug, thiserror::Error)]
pub enum NicoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
