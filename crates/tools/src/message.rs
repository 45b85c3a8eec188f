//! Message tool — lets the LLM (and subagents) talk to the user directly,
//! mid-turn, instead of waiting for the final response.
//!
//! The tool carries the current channel/chat as contextual state, and tracks
//! whether it has sent anything during the current round so the loop can
//! avoid republishing the LLM's final answer on top of it.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use hermitclaw_bus::OutboundMessage;
use hermitclaw_core::tool::{ContextualTool, Tool, ToolContext, ToolResult};

/// Delivery callback — typically publishes onto the message bus.
pub type SendCallback =
    Arc<dyn Fn(OutboundMessage) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct MessageTool {
    send: SendCallback,
    /// Current (channel, chat_id) target, set by the loop before each round.
    target: Mutex<(String, String)>,
    sent_in_round: AtomicBool,
}

impl MessageTool {
    pub fn new(send: SendCallback) -> Self {
        Self {
            send,
            target: Mutex::new((String::new(), String::new())),
            sent_in_round: AtomicBool::new(false),
        }
    }

    /// Whether this tool delivered anything since the last `set_context`.
    pub fn has_sent_in_round(&self) -> bool {
        self.sent_in_round.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "message"
    }

    fn description(&self) -> &str {
        "Send a message directly to the user right now. Use this for progress updates \
         during long tasks, or when you want to deliver an answer before continuing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The message text to deliver to the user"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let Some(content) = arguments["content"].as_str() else {
            return ToolResult::err("Missing 'content' argument");
        };
        if content.is_empty() {
            return ToolResult::err("Cannot send an empty message");
        }

        // Prefer the contextual target; fall back to the per-call context.
        let (mut channel, mut chat_id) = self.target.lock().unwrap().clone();
        if channel.is_empty() {
            channel = ctx.channel.clone();
        }
        if chat_id.is_empty() {
            chat_id = ctx.chat_id.clone();
        }
        if channel.is_empty() || chat_id.is_empty() {
            return ToolResult::err("No target channel for message delivery");
        }

        (self.send)(OutboundMessage {
            channel: channel.clone(),
            chat_id,
            content: content.to_string(),
        })
        .await;

        self.sent_in_round.store(true, Ordering::SeqCst);
        debug!(channel = %channel, chars = content.len(), "Message tool delivered");

        // The delivery itself already reached the user; stay silent.
        ToolResult::for_llm("Message sent to user.")
    }

    fn as_contextual(&self) -> Option<&dyn ContextualTool> {
        Some(self)
    }
}

impl ContextualTool for MessageTool {
    fn set_context(&self, channel: &str, chat_id: &str) {
        *self.target.lock().unwrap() = (channel.to_string(), chat_id.to_string());
        // A new context means a new round: the sent flag starts clean.
        self.sent_in_round.store(false, Ordering::SeqCst);
    }
}
