//! LlmProvider trait — the abstraction over LLM backends.
//!
//! A provider knows how to send a message list plus tool schemas to an LLM
//! and return the assistant's content and any requested tool calls.
//! Failover across providers is owned by the agent loop, which iterates an
//! ordered list per call — providers themselves stay single-backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Model parameters for a single chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic, higher = creative)
    pub temperature: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

/// A tool schema sent to the LLM, in the function-calling wire shape:
/// `{"type": "function", "function": {"name", "description", "parameters"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,

    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Build a function-typed definition.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".into(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// The function half of a [`ToolDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
///
/// Responses are delivered as complete messages; token streaming is not
/// part of this contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's text content (may be empty when tools are called)
    pub content: String,

    /// Tool calls the model wants executed, in the order it returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    /// A plain text response with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// The core provider trait.
///
/// Every LLM backend implements this. The agent loop calls `chat` without
/// knowing which backend is behind it. Implementations must tolerate an
/// empty `tools` slice.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a message list and tool schemas, get content + tool calls back.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        params: &ChatParams,
    ) -> std::result::Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = ChatParams::default();
        assert_eq!(params.max_tokens, 8192);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn tool_definition_wire_shape() {
        let def = ToolDefinition::function(
            "shell",
            "Execute a shell command",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" }
                },
                "required": ["command"]
            }),
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "shell");
        assert!(json["function"]["parameters"]["properties"]["command"].is_object());
    }

    #[test]
    fn chat_response_text_has_no_tool_calls() {
        let resp = ChatResponse::text("done");
        assert_eq!(resp.content, "done");
        assert!(resp.tool_calls.is_empty());
    }
}
