//! Memory subsystem for Nicole
//!
//! Importance scoring, context compression, long-term storage and prompt
//! injection. The lifecycle per turn: score the message, append to the
//! store when it qualifies, compress the live window when it grows past
//! the threshold, and fold stored memories back into the system prompt at
//! the start of the next session.

mod compress;
mod context;
mod importance;
mod store;

pub use compress::compress;
pub use context::{build_memory_context, inject_into_system, memory_summary, MEMORY_HEADER};
pub use importance::{enhanced_score, score, STORAGE_THRESHOLD, SUMMARY_THRESHOLD};
pub use store::{LongTermMemory, MemoryEntry, MemoryKind, MAX_ENTRIES};
