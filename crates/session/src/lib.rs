//! Session store — per-key conversation history with two-tier persistence.
//!
//! The in-memory map is authoritative. Each session is additionally written
//! to `<dir>/<key>.json` on `save` so conversations survive restarts, and an
//! optional [`SessionBackend`] mirrors history to a durable external store.
//! Persistence failures are logged and never abort an agent turn.
//!
//! Concurrency: the outer loop serializes turns per session; summarization
//! may run alongside a later turn, so every session sits behind its own
//! mutex and lock scopes stay short (never held across awaits).

pub mod backend;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::{MachineState, SessionBackend};
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use hermitclaw_core::message::{Message, Role};

/// One conversation thread: ordered history plus a rolling summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub history: Vec<Message>,

    #[serde(default)]
    pub summary: String,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Map of `session_key → Session` with lazy file-backed loading.
pub struct SessionStore {
    dir: PathBuf,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    /// Create a store rooted at the given directory. The directory is
    /// created on first save; missing files mean empty sessions.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The directory session files live under.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Get (or lazily create/load) the entry for a key.
    fn entry(&self, key: &str) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().unwrap().get(key) {
            return existing.clone();
        }

        let mut map = self.sessions.write().unwrap();
        // Double-check: another thread may have loaded it meanwhile.
        if let Some(existing) = map.get(key) {
            return existing.clone();
        }

        let session = self.load_from_disk(key).unwrap_or_default();
        let entry = Arc::new(Mutex::new(session));
        map.insert(key.to_string(), entry.clone());
        entry
    }

    fn load_from_disk(&self, key: &str) -> Option<Session> {
        let path = self.session_path(key);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Session>(&content) {
            Ok(session) => {
                debug!(key, messages = session.history.len(), "Session loaded from disk");
                Some(session)
            }
            Err(e) => {
                warn!(key, error = %e, "Skipping corrupted session file");
                None
            }
        }
    }

    fn session_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// Ordered history for a session (empty for unknown keys).
    pub fn get_history(&self, key: &str) -> Vec<Message> {
        self.entry(key).lock().unwrap().history.clone()
    }

    /// Current rolling summary for a session.
    pub fn get_summary(&self, key: &str) -> String {
        self.entry(key).lock().unwrap().summary.clone()
    }

    /// Append a plain-text message.
    pub fn add_message(&self, key: &str, role: Role, content: impl Into<String>) {
        let entry = self.entry(key);
        let mut session = entry.lock().unwrap();
        session.history.push(match role {
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
            Role::System => Message::system(content),
            Role::Tool => Message::tool_result("", content),
        });
        session.touch();
    }

    /// Append a complete message (tool calls, tool_call_id and all).
    pub fn add_full_message(&self, key: &str, message: Message) {
        let entry = self.entry(key);
        let mut session = entry.lock().unwrap();
        session.history.push(message);
        session.touch();
    }

    /// Replace the rolling summary.
    pub fn set_summary(&self, key: &str, summary: impl Into<String>) {
        let entry = self.entry(key);
        let mut session = entry.lock().unwrap();
        session.summary = summary.into();
        session.touch();
    }

    /// Drop all but the last `keep_last_n` history entries.
    pub fn truncate_history(&self, key: &str, keep_last_n: usize) {
        let entry = self.entry(key);
        let mut session = entry.lock().unwrap();
        let len = session.history.len();
        if len > keep_last_n {
            session.history.drain(..len - keep_last_n);
            session.touch();
        }
    }

    /// Persist a session to its file. Failures are logged at warn; the
    /// in-memory copy remains authoritative.
    pub fn save(&self, key: &str) {
        let snapshot = self.entry(key).lock().unwrap().clone();
        let path = self.session_path(key);

        if let Err(e) = write_atomically(&path, &snapshot) {
            warn!(key, error = %e, "Failed to persist session");
        }
    }

    /// Session keys currently resident in memory.
    pub fn loaded_keys(&self) -> Vec<String> {
        self.sessions.read().unwrap().keys().cloned().collect()
    }
}

fn write_atomically(path: &PathBuf, session: &Session) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Write-then-rename so a crash mid-write never truncates the live file.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// Make a session key safe to use as a file name.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
