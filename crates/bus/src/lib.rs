//! In-process message bus — two bounded FIFO queues decoupling transport
//! adapters from the agent loop.
//!
//! Transports publish [`InboundMessage`]s and consume [`OutboundMessage`]s;
//! the agent loop does the opposite. Per-(channel, chat_id) ordering follows
//! from each direction being a single FIFO queue with one consumer. There is
//! no deduplication and no persistence: a restart drops queued messages.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default capacity of each queue before publishers block.
pub const DEFAULT_CAPACITY: usize = 256;

/// A message flowing from a transport to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport the message arrived on ("cli", "telegram", "system", …)
    pub channel: String,

    /// Platform-specific sender identifier
    pub sender_id: String,

    /// Chat/group/DM identifier within the channel
    pub chat_id: String,

    /// The text content
    pub content: String,

    /// Conversation thread identifier, usually `channel:chat_id`
    pub session_key: String,
}

/// A message flowing from the agent (or a tool) back to a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
}

/// The bus: bounded inbound and outbound queues.
///
/// Publish operations block under backpressure and honor cancellation.
/// Consume operations block until a message arrives, returning `None` on
/// cancellation or when all publishers are gone.
pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Mutex<mpsc::Receiver<OutboundMessage>>,
}

impl MessageBus {
    /// Create a bus with the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        Self {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        }
    }

    /// Publish a message for the agent. Blocks under backpressure; gives up
    /// cleanly when `cancel` fires first.
    pub async fn publish_inbound(&self, msg: InboundMessage, cancel: &CancellationToken) {
        tokio::select! {
            result = self.inbound_tx.send(msg) => {
                if result.is_err() {
                    warn!("Inbound queue closed, dropping message");
                }
            }
            _ = cancel.cancelled() => {}
        }
    }

    /// Consume the next inbound message. `None` on cancellation or when the
    /// queue is closed.
    pub async fn consume_inbound(&self, cancel: &CancellationToken) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            msg = rx.recv() => msg,
            _ = cancel.cancelled() => None,
        }
    }

    /// Publish a message for a transport adapter.
    pub async fn publish_outbound(&self, msg: OutboundMessage, cancel: &CancellationToken) {
        tokio::select! {
            result = self.outbound_tx.send(msg) => {
                if result.is_err() {
                    warn!("Outbound queue closed, dropping message");
                }
            }
            _ = cancel.cancelled() => {}
        }
    }

    /// Consume the next outbound message. `None` on cancellation or when the
    /// queue is closed.
    pub async fn consume_outbound(&self, cancel: &CancellationToken) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.lock().await;
        tokio::select! {
            msg = rx.recv() => msg,
            _ = cancel.cancelled() => None,
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
