//! Channel trait — the abstraction over chat transports.
//!
//! A channel connects HermitClaw to a messaging surface (CLI, Telegram,
//! Discord, …). It receives messages from users and sends responses back.
//! Implementations handle platform-specific connection logic, formatting,
//! and authentication; the agent only ever sees [`ChannelMessage`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A message received from a channel, before it becomes a bus record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    /// The text content
    pub content: String,
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, also used as the bus `channel` field (e.g., "cli").
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. The channel
    /// implementation handles polling, webhooks, or terminal IO internally.
    async fn start(
        &self,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<ChannelMessage>, ChannelError>;

    /// Send a response message to a specific chat.
    async fn send(&self, chat_id: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
