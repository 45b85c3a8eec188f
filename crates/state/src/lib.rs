//! Workspace-local state persistence.
//!
//! Tracks the last active channel and chat id so background work (heartbeat
//! results, spawned subagent notices) can reach the user who most recently
//! talked to the agent. The file is plain JSON, readable by external
//! processes, and every write goes through write-temp-then-rename so a
//! crash can never leave a half-written file behind.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted record. No schema versioning: the two keys are stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    last_channel: String,

    #[serde(default)]
    last_chat_id: String,
}

/// Manages the workspace state file under a process-level lock.
pub struct StateManager {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl StateManager {
    /// Create a manager for `<workspace>/state.json`, loading any existing
    /// file.
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        let path = workspace.as_ref().join(STATE_FILE);
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Record the last active channel (typically `channel:chat_id`).
    pub fn set_last_channel(&self, channel: &str) -> Result<(), StateError> {
        let mut state = self.state.lock().unwrap();
        state.last_channel = channel.to_string();
        self.flush(&state)
    }

    /// Record the last active chat id.
    pub fn set_last_chat_id(&self, chat_id: &str) -> Result<(), StateError> {
        let mut state = self.state.lock().unwrap();
        state.last_chat_id = chat_id.to_string();
        self.flush(&state)
    }

    /// The last recorded channel, if any.
    pub fn last_channel(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        (!state.last_channel.is_empty()).then(|| state.last_channel.clone())
    }

    /// The last recorded chat id, if any.
    pub fn last_chat_id(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        (!state.last_chat_id.is_empty()).then(|| state.last_chat_id.clone())
    }

    fn flush(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "State flushed");
        Ok(())
    }
}
