//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: run shell
//! commands, read/write files, fetch web pages, message the user, spawn
//! subagents. Tools never abort a turn: every failure is carried inside the
//! returned [`ToolResult`] so the loop can feed it back to the LLM.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::ToolDefinition;

/// Callback invoked by "async" tools when long-running background work
/// completes after `execute` has already returned.
pub type AsyncNotifier = Arc<dyn Fn(ToolResult) + Send + Sync>;

/// The result of a tool execution.
///
/// `for_llm` becomes a `tool`-role history entry; `for_user` may be
/// published to the transport. `silent` dominates: when set, the user never
/// sees `for_user` regardless of its content.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// Text fed back to the LLM as the tool message content
    pub for_llm: String,

    /// Text shown to the user (empty = nothing to say)
    pub for_user: String,

    /// Suppress user delivery entirely
    pub silent: bool,

    /// Execution error, if any. When `for_llm` is empty this becomes the
    /// tool message content so the LLM can recover or explain.
    pub error: Option<String>,
}

impl ToolResult {
    /// A silent result only the LLM sees.
    pub fn for_llm(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            silent: true,
            ..Self::default()
        }
    }

    /// A result with distinct LLM and user content.
    pub fn for_both(for_llm: impl Into<String>, for_user: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            for_user: for_user.into(),
            silent: false,
            error: None,
        }
    }

    /// A failed execution.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            silent: true,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// The content the loop should feed to the LLM: `for_llm`, or the error
    /// message when `for_llm` is empty.
    pub fn llm_content(&self) -> &str {
        if self.for_llm.is_empty() {
            self.error.as_deref().unwrap_or("")
        } else {
            &self.for_llm
        }
    }
}

/// Per-call execution context handed to every tool.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Channel the triggering message arrived on
    pub channel: String,

    /// Chat the triggering message arrived from
    pub chat_id: String,

    /// Completion callback for tools that finish work in the background
    pub notify: Option<AsyncNotifier>,
}

impl ToolContext {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            notify: None,
        }
    }

    pub fn with_notifier(mut self, notify: AsyncNotifier) -> Self {
        self.notify = Some(notify);
        self
    }
}

/// The core Tool trait.
///
/// Each tool implements this and registers in the [`ToolRegistry`]. Tools
/// needing the originating channel/chat (to send side messages to the right
/// user) additionally implement [`ContextualTool`] and surface it through
/// `as_contextual`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult;

    /// The contextual capability, if this tool carries channel/chat state.
    fn as_contextual(&self) -> Option<&dyn ContextualTool> {
        None
    }

    /// Convert this tool into a definition for the LLM protocol.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters_schema())
    }
}

/// Marker capability for tools that track the current channel/chat.
///
/// The loop calls `set_context` before every LLM round so that
/// tool-produced outbound messages land at the correct user.
pub trait ContextualTool: Send + Sync {
    fn set_context(&self, channel: &str, chat_id: &str);
}

/// A registry of available tools.
///
/// Contents are immutable after startup; per-tool mutable context lives
/// inside the tools themselves behind their own locks.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool schemas, formatted for the LLM protocol.
    pub fn to_provider_defs(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Propagate the current channel/chat into every contextual tool.
    pub fn set_context_all(&self, channel: &str, chat_id: &str) {
        for tool in self.tools.values() {
            if let Some(contextual) = tool.as_contextual() {
                contextual.set_context(channel, chat_id);
            }
        }
    }

    /// Execute a tool by name with per-call context.
    ///
    /// Synchronous from the caller's perspective: "async" tools may return
    /// immediately with an empty `for_llm` and later invoke the notifier.
    /// An unknown name yields a `ToolResult` with `error` populated.
    pub async fn execute_with_context(
        &self,
        name: &str,
        arguments: serde_json::Value,
        channel: &str,
        chat_id: &str,
        notify: Option<AsyncNotifier>,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(format!("Unknown tool: {name}"));
        };

        let mut ctx = ToolContext::new(channel, chat_id);
        ctx.notify = notify;
        tool.execute(arguments, &ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            ToolResult::for_llm(text)
        }
    }

    /// A contextual test tool that remembers the last context it was given.
    struct TargetedTool {
        last: Mutex<(String, String)>,
    }

    #[async_trait]
    impl Tool for TargetedTool {
        fn name(&self) -> &str {
            "targeted"
        }
        fn description(&self) -> &str {
            "Remembers its context"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            let last = self.last.lock().unwrap();
            ToolResult::for_llm(format!("{}:{}", last.0, last.1))
        }
        fn as_contextual(&self) -> Option<&dyn ContextualTool> {
            Some(self)
        }
    }

    impl ContextualTool for TargetedTool {
        fn set_context(&self, channel: &str, chat_id: &str) {
            *self.last.lock().unwrap() = (channel.to_string(), chat_id.to_string());
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_provider_defs() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.to_provider_defs();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, "function");
        assert_eq!(defs[0].function.name, "echo");
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry
            .execute_with_context(
                "echo",
                serde_json::json!({"text": "hello world"}),
                "cli",
                "c1",
                None,
            )
            .await;
        assert!(result.error.is_none());
        assert_eq!(result.for_llm, "hello world");
    }

    #[tokio::test]
    async fn registry_unknown_tool_returns_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute_with_context("nonexistent", serde_json::json!({}), "cli", "c1", None)
            .await;
        assert!(result.error.is_some());
        assert!(result.llm_content().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn context_propagates_to_contextual_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TargetedTool {
            last: Mutex::new((String::new(), String::new())),
        }));
        registry.register(Arc::new(EchoTool));

        registry.set_context_all("telegram", "chat42");

        let result = registry
            .execute_with_context("targeted", serde_json::json!({}), "telegram", "chat42", None)
            .await;
        assert_eq!(result.for_llm, "telegram:chat42");
    }

    #[test]
    fn llm_content_falls_back_to_error() {
        let result = ToolResult::err("boom");
        assert_eq!(result.llm_content(), "boom");

        let result = ToolResult::for_llm("ok");
        assert_eq!(result.llm_content(), "ok");
    }
}
