//! LLM provider implementations for HermitClaw.
//!
//! All providers implement the `hermitclaw_core::LlmProvider` trait.
//! Failover across providers is owned by the agent loop, which tries an
//! ordered list per call — there is deliberately no fallback wrapper here.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
