//! # HermitClaw Core
//!
//! Domain types, traits, and error definitions for the HermitClaw agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelMessage};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role, ToolCall};
pub use provider::{ChatParams, ChatResponse, LlmProvider, ToolDefinition};
pub use tool::{ContextualTool, Tool, ToolContext, ToolRegistry, ToolResult};

/// The channel name reserved for inter-agent plumbing (subagent completion
/// notices). Messages on it are consumed by the loop, never shown to users.
pub const SYSTEM_CHANNEL: &str = "system";

/// Session keys with this prefix belong to heartbeat turns: no history,
/// no summarization, no durable persistence.
pub const HEARTBEAT_PREFIX: &str = "heartbeat:";

/// Whether a channel name is reserved for internal plumbing.
///
/// Internal channels never reach a transport adapter and never update the
/// last-active-channel state.
pub fn is_internal_channel(name: &str) -> bool {
    matches!(name, "system" | "subagent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_channel_is_internal() {
        assert!(is_internal_channel("system"));
        assert!(is_internal_channel("subagent"));
        assert!(!is_internal_channel("telegram"));
        assert!(!is_internal_channel("cli"));
    }
}
