//! Crash-safety guard: best-effort recovery snapshots.
//!
//! The session publishes a point-in-time tail of its conversation log and
//! memory store after each turn. On SIGINT/SIGTERM the guard writes that
//! last published state to a timestamped file and terminates the process;
//! every 50th turn the session asks for the same write without
//! terminating. Snapshots are never read back automatically - recovery is
//! manual.

use crate::memory::MemoryEntry;
use crate::message::{local_timestamp, Message};
use crate::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Write-once recovery file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencySnapshot {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    pub conversation_tail: Vec<Message>,
    pub memory_tail: Vec<MemoryEntry>,
    pub message_count: usize,
}

/// Read-only state the session publishes for the guard. A snapshot may be
/// slightly stale relative to the exact point of interruption; that is
/// accepted.
#[derive(Debug, Clone, Default)]
pub struct SnapshotState {
    pub conversation_tail: Vec<Message>,
    pub memory_tail: Vec<MemoryEntry>,
    pub message_count: usize,
}

pub struct EmergencyGuard {
    backup_dir: PathBuf,
    latest: Arc<Mutex<SnapshotState>>,
}

impl EmergencyGuard {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let backup_dir = data_dir.join("emergency_backup");
        tokio::fs::create_dir_all(&backup_dir).await?;
        Ok(Self {
            backup_dir,
            latest: Arc::default(),
        })
    }

    /// Replace the published state. Cheap; called once per turn.
    pub fn publish(&self, state: SnapshotState) {
        match self.latest.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Periodic checkpoint: write a snapshot of the published state and
    /// keep running.
    pub async fn checkpoint(&self) -> Result<PathBuf> {
        let state = self.current();
        let path = write_snapshot(&self.backup_dir, &state, None)?;
        info!(path = %path.display(), "periodic checkpoint written");
        Ok(path)
    }

    /// Spawn the signal listener. On SIGINT (and SIGTERM on unix) a
    /// snapshot is written synchronously from the published state and the
    /// process exits with a non-zero status. A failed write is logged and
    /// termination still proceeds.
    pub fn install(&self) {
        let backup_dir = self.backup_dir.clone();
        let latest = Arc::clone(&self.latest);

        tokio::spawn(async move {
            let signal_name = wait_for_termination().await;
            error!("signal {signal_name} received, writing emergency snapshot");

            let state = match latest.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            match write_snapshot(&backup_dir, &state, Some(signal_name)) {
                Ok(path) => info!(path = %path.display(), "emergency snapshot written"),
                Err(e) => warn!("emergency snapshot failed: {e}"),
            }

            std::process::exit(1);
        });
    }

    fn current(&self) -> SnapshotState {
        match self.latest.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> String {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT".to_string(),
                _ = term.recv() => "SIGTERM".to_string(),
            }
        }
        Err(e) => {
            warn!("could not register SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT".to_string()
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> String {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT".to_string()
}

/// Blocking snapshot write - a single small file, no network. Must stay
/// quick because the signal path runs it before termination.
fn write_snapshot(dir: &Path, state: &SnapshotState, signal: Option<String>) -> Result<PathBuf> {
    let suffix = if signal.is_some() { "_emergency" } else { "" };
    let name = format!("{}{}.json", Local::now().format("%Y%m%d_%H%M%S"), suffix);
    let path = dir.join(name);

    let snapshot = EmergencySnapshot {
        timestamp: local_timestamp(),
        signal,
        conversation_tail: state.conversation_tail.clone(),
        memory_tail: state.memory_tail.clone(),
        message_count: state.message_count,
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
