//! The durable store contract.
//!
//! Absent a backend, the in-memory/file session store is authoritative.
//! Backends are best-effort mirrors: the loop loads from them when
//! connected and falls back to local state on any failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hermitclaw_core::error::SessionError;
use hermitclaw_core::message::Message;

/// One-per-process logical record in the durable store: machine identity
/// plus free-form preference and memory documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineState {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub preferences: serde_json::Value,

    #[serde(default)]
    pub memory: serde_json::Value,
}

/// External persistence for session history.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Load a session's history. An unknown key is an error (callers fall
    /// back to local state).
    async fn load_session(&self, key: &str) -> Result<Vec<Message>, SessionError>;

    /// Replace a session's stored history.
    async fn save_session(&self, key: &str, messages: &[Message]) -> Result<(), SessionError>;

    /// Whether the backend is reachable. Callers skip load/save when false.
    fn is_connected(&self) -> bool;
}
