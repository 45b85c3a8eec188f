//! End-to-end integration tests for the HermitClaw runtime.
//!
//! These exercise the full pipeline — bus in, agent loop, tool execution,
//! bus out — with a scripted provider standing in for the LLM and the real
//! built-in tool registry running against a temporary workspace.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hermitclaw_agent::{
    AgentLoop, AgentLoopConfig, ContextBuilder, Personality, SpawnTool, SubagentManager,
    SubagentTool,
};
use hermitclaw_bus::{InboundMessage, MessageBus, OutboundMessage};
use hermitclaw_core::error::ProviderError;
use hermitclaw_core::message::{Message, ToolCall};
use hermitclaw_core::provider::{ChatParams, ChatResponse, LlmProvider, ToolDefinition};
use hermitclaw_core::EventBus;
use hermitclaw_session::SessionStore;
use hermitclaw_state::StateManager;
use hermitclaw_tools::{default_registry, MessageTool, SendCallback};

// ── Mock provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence; panics when exhausted.
struct ScriptedProvider {
    responses: Mutex<Vec<ChatResponse>>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _model: &str,
        _params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        let mut responses = self.responses.lock().unwrap();
        let mut count = self.call_count.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted at call #{}", *count + 1);
        }
        *count += 1;
        Ok(responses.remove(0))
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}

fn tool_response(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: calls,
    }
}

// ── Harness: the same wiring the gateway command performs ────────────────

struct Runtime {
    agent: Arc<AgentLoop>,
    bus: Arc<MessageBus>,
    cancel: CancellationToken,
    workspace: tempfile::TempDir,
}

fn build_runtime(provider: Arc<dyn LlmProvider>) -> Runtime {
    let workspace = tempfile::TempDir::new().unwrap();
    let bus = Arc::new(MessageBus::new());
    let cancel = CancellationToken::new();
    let events = Arc::new(EventBus::default());
    let sessions = Arc::new(SessionStore::new(workspace.path().join("sessions")));
    let state = Arc::new(StateManager::new(workspace.path()));

    let send: SendCallback = {
        let bus = bus.clone();
        let cancel = cancel.clone();
        Arc::new(move |msg: OutboundMessage| {
            let bus = bus.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                bus.publish_outbound(msg, &cancel).await;
            })
        })
    };

    let loop_config = AgentLoopConfig {
        model: "test-model".into(),
        context_window: 128_000,
        max_iterations: 10,
    };

    // Child loop with a registry that never sees spawn/subagent.
    let child_message_tool = Arc::new(MessageTool::new(send.clone()));
    let child_tools = Arc::new(default_registry(
        workspace.path(),
        true,
        child_message_tool.clone(),
    ));
    let child = Arc::new(
        AgentLoop::new(
            loop_config.clone(),
            vec![provider.clone()],
            child_tools,
            sessions.clone(),
            state.clone(),
            bus.clone(),
            events.clone(),
            ContextBuilder::new(workspace.path(), "Hermit"),
            Personality::default(),
            cancel.clone(),
        )
        .with_message_tool(child_message_tool),
    );
    let subagents = Arc::new(SubagentManager::new(child, bus.clone(), cancel.clone()));

    let message_tool = Arc::new(MessageTool::new(send));
    let mut registry = default_registry(workspace.path(), true, message_tool.clone());
    registry.register(Arc::new(SpawnTool::new(subagents.clone())));
    registry.register(Arc::new(SubagentTool::new(subagents)));
    let tools = Arc::new(registry);

    let agent = Arc::new(
        AgentLoop::new(
            loop_config,
            vec![provider],
            tools.clone(),
            sessions,
            state,
            bus.clone(),
            events,
            ContextBuilder::new(workspace.path(), "Hermit").with_tools(tools.list()),
            Personality::default(),
            cancel.clone(),
        )
        .with_message_tool(message_tool),
    );

    Runtime {
        agent,
        bus,
        cancel,
        workspace,
    }
}

fn inbound(content: &str) -> InboundMessage {
    InboundMessage {
        channel: "cli".into(),
        sender_id: "local".into(),
        chat_id: "direct".into(),
        content: content.into(),
        session_key: "cli:direct".into(),
    }
}

async fn next_outbound(rt: &Runtime) -> OutboundMessage {
    tokio::time::timeout(Duration::from_secs(5), rt.bus.consume_outbound(&rt.cancel))
        .await
        .expect("timed out waiting for outbound")
        .expect("bus closed")
}

// ── E2E: fast-path greeting ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_greeting_never_touches_the_llm() {
    let provider = ScriptedProvider::new(vec![]); // Would panic if called
    let rt = build_runtime(provider.clone());

    let run = {
        let agent = rt.agent.clone();
        tokio::spawn(async move { agent.run().await })
    };

    rt.bus.publish_inbound(inbound("oi"), &rt.cancel).await;
    let reply = next_outbound(&rt).await;

    assert_eq!(reply.channel, "cli");
    assert_eq!(reply.chat_id, "direct");
    assert!(
        reply.content.contains("Bom dia")
            || reply.content.contains("Boa tarde")
            || reply.content.contains("Boa noite"),
        "unexpected greeting: {}",
        reply.content
    );
    assert_eq!(provider.calls(), 0);

    rt.cancel.cancel();
    run.await.unwrap();
}

// ── E2E: tool round-trip against the real registry ───────────────────────

#[tokio::test]
async fn e2e_write_file_tool_round_trip() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "t1",
            "write_file",
            serde_json::json!({"path": "notes/todo.md", "content": "- buy milk\n"}),
        )]),
        ChatResponse::text("Saved your todo list."),
    ]);
    let rt = build_runtime(provider.clone());

    let run = {
        let agent = rt.agent.clone();
        tokio::spawn(async move { agent.run().await })
    };

    rt.bus
        .publish_inbound(inbound("save a todo list for me"), &rt.cancel)
        .await;
    let reply = next_outbound(&rt).await;

    assert_eq!(reply.content, "Saved your todo list.");
    assert_eq!(provider.calls(), 2);

    // The tool really touched the workspace.
    let written =
        std::fs::read_to_string(rt.workspace.path().join("notes/todo.md")).unwrap();
    assert_eq!(written, "- buy milk\n");

    rt.cancel.cancel();
    run.await.unwrap();
}

// ── E2E: message tool suppresses the duplicate final answer ──────────────

#[tokio::test]
async fn e2e_message_tool_single_delivery() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "t1",
            "message",
            serde_json::json!({"content": "deploy finished ✅"}),
        )]),
        ChatResponse::text("deploy finished ✅"),
    ]);
    let rt = build_runtime(provider);

    let run = {
        let agent = rt.agent.clone();
        tokio::spawn(async move { agent.run().await })
    };

    rt.bus
        .publish_inbound(inbound("tell me when the deploy is done"), &rt.cancel)
        .await;

    let first = next_outbound(&rt).await;
    assert_eq!(first.content, "deploy finished ✅");

    // No duplicate follows.
    let extra =
        tokio::time::timeout(Duration::from_millis(200), rt.bus.consume_outbound(&rt.cancel))
            .await;
    assert!(extra.is_err(), "duplicate delivery: {:?}", extra.unwrap());

    rt.cancel.cancel();
    run.await.unwrap();
}

// ── E2E: background subagent completion flows through the system channel ──

/// Routes by conversation shape so parent and child turns can interleave:
/// the child's task prompt gets the child answer, the parent's first call
/// gets a spawn tool call, and the parent's follow-up gets the final text.
struct RoutingProvider {
    call_count: Mutex<usize>,
}

#[async_trait::async_trait]
impl LlmProvider for RoutingProvider {
    fn name(&self) -> &str {
        "e2e_router"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _model: &str,
        _params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == hermitclaw_core::Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        if last_user.contains("collect disk stats") {
            // The child turn.
            return Ok(ChatResponse::text("disk usage nominal"));
        }
        if messages.iter().any(|m| m.role == hermitclaw_core::Role::Tool) {
            // Parent follow-up after the spawn tool returned.
            return Ok(ChatResponse::text("Started a background task for you."));
        }
        Ok(tool_response(vec![tool_call(
            "t1",
            "spawn",
            serde_json::json!({"task": "collect disk stats"}),
        )]))
    }
}

#[tokio::test]
async fn e2e_spawned_subagent_completion_notice_is_consumed() {
    let provider = Arc::new(RoutingProvider {
        call_count: Mutex::new(0),
    });
    let rt = build_runtime(provider.clone());

    let run = {
        let agent = rt.agent.clone();
        tokio::spawn(async move { agent.run().await })
    };

    rt.bus
        .publish_inbound(inbound("check disk usage in the background"), &rt.cancel)
        .await;

    // The user sees the parent's answer.
    let reply = next_outbound(&rt).await;
    assert_eq!(reply.content, "Started a background task for you.");

    // Wait for the child turn to complete (parent 2 calls + child 1).
    for _ in 0..100 {
        if *provider.call_count.lock().unwrap() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*provider.call_count.lock().unwrap(), 3);

    // The child's completion notice goes through the system channel and is
    // consumed without producing user-visible output.
    let extra =
        tokio::time::timeout(Duration::from_millis(300), rt.bus.consume_outbound(&rt.cancel))
            .await;
    assert!(extra.is_err(), "system notice leaked: {:?}", extra.unwrap());

    rt.cancel.cancel();
    run.await.unwrap();
}
