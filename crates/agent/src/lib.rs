//! The HermitClaw agent loop and its supporting machinery.
//!
//! This crate orchestrates everything: it consumes inbound messages from the
//! bus, answers recognized intents from rule-based fast paths backed by a
//! response cache, and delegates the rest to an LLM tool-calling iteration
//! with provider failover. Session history persists through the session
//! store with background rolling summarization, and subagents run as child
//! loops with a structurally restricted tool set.

pub mod cache;
pub mod context;
pub mod loop_runner;
pub mod personality;
pub mod reasoning;
pub mod subagent;
pub mod summarizer;

pub use cache::ResponseCache;
pub use context::ContextBuilder;
pub use loop_runner::{AgentLoop, AgentLoopConfig, TurnOptions, DEFAULT_RESPONSE};
pub use personality::Personality;
pub use reasoning::{Intent, ReasoningEngine};
pub use subagent::{SpawnTool, SubagentManager, SubagentTool};
pub use summarizer::Summarizer;
