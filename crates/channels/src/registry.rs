//! Channel registry — manages all active channel instances.
//!
//! Pumps inbound messages from every adapter onto the bus (deriving the
//! session key as `channel:chat_id`) and dispatches outbound bus messages
//! back to the correct adapter.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hermitclaw_bus::{InboundMessage, MessageBus};
use hermitclaw_core::channel::Channel;
use hermitclaw_core::error::ChannelError;

/// Central registry holding all enabled channel instances.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    /// Get a channel by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// List all registered channel names.
    pub fn list(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start all channels and pump their messages onto the bus.
    ///
    /// One task per channel maps [`hermitclaw_core::ChannelMessage`] into an
    /// [`InboundMessage`] with `session_key = "channel:chat_id"`. Senders
    /// failing the channel's allowlist are dropped with a warning.
    pub async fn start_all(
        &self,
        bus: Arc<MessageBus>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError> {
        for (name, channel) in &self.channels {
            let mut rx = channel.start().await?;
            let channel_name = name.clone();
            let channel = channel.clone();
            let bus = bus.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                loop {
                    let msg = tokio::select! {
                        msg = rx.recv() => match msg {
                            Some(m) => m,
                            None => break, // Adapter stream ended
                        },
                        _ = cancel.cancelled() => break,
                    };

                    if !channel.is_allowed(&msg.sender_id) {
                        warn!(
                            channel = %channel_name,
                            sender_id = %msg.sender_id,
                            "Dropping message from unauthorized sender"
                        );
                        continue;
                    }

                    let inbound = InboundMessage {
                        channel: channel_name.clone(),
                        sender_id: msg.sender_id,
                        session_key: format!("{}:{}", channel_name, msg.chat_id),
                        chat_id: msg.chat_id,
                        content: msg.content,
                    };
                    bus.publish_inbound(inbound, &cancel).await;
                }
            });

            info!(channel = %name, "Started channel");
        }

        Ok(())
    }

    /// Consume outbound bus messages and deliver them until cancelled.
    ///
    /// Messages for unknown channels are logged and dropped — a transport
    /// that was never registered cannot be delivered to.
    pub async fn run_outbound_dispatch(&self, bus: Arc<MessageBus>, cancel: CancellationToken) {
        while let Some(msg) = bus.consume_outbound(&cancel).await {
            match self.channels.get(&msg.channel) {
                Some(channel) => {
                    if let Err(e) = channel.send(&msg.chat_id, &msg.content).await {
                        warn!(channel = %msg.channel, error = %e, "Outbound delivery failed");
                    }
                }
                None => {
                    warn!(channel = %msg.channel, "Dropping outbound for unknown channel");
                }
            }
        }
    }

    /// Stop all channels gracefully.
    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }
}
