//! The agent loop — consumes inbound messages and orchestrates everything.
//!
//! A turn runs: record context → classify → cache probe → personality fast
//! path → LLM tool iteration with provider failover → finalize (persist,
//! maybe summarize, maybe cache). System-channel messages (subagent
//! completion notices) are consumed and logged, never forwarded to users.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hermitclaw_bus::{InboundMessage, MessageBus, OutboundMessage};
use hermitclaw_core::error::{Error, ProviderError, Result};
use hermitclaw_core::event::{DomainEvent, EventBus};
use hermitclaw_core::message::{Message, Role};
use hermitclaw_core::provider::{ChatParams, ChatResponse, LlmProvider, ToolDefinition};
use hermitclaw_core::tool::{AsyncNotifier, ToolRegistry, ToolResult};
use hermitclaw_core::{is_internal_channel, HEARTBEAT_PREFIX, SYSTEM_CHANNEL};
use hermitclaw_session::{SessionBackend, SessionStore};
use hermitclaw_state::StateManager;
use hermitclaw_tools::MessageTool;

use crate::cache::ResponseCache;
use crate::context::ContextBuilder;
use crate::personality::Personality;
use crate::reasoning::{Intent, ReasoningEngine};
use crate::summarizer::Summarizer;

/// Sent when the LLM produced no final content.
pub const DEFAULT_RESPONSE: &str = "I've completed processing but have no response to give.";

/// Minimum classifier confidence for the personality fast path.
const FAST_PATH_CONFIDENCE: f64 = 0.85;

/// Final responses shorter than this are cached for non-complex intents.
const CACHEABLE_RESPONSE_CHARS: usize = 500;

/// Static configuration for an [`AgentLoop`].
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Model identifier passed to every provider in the chain
    pub model: String,

    /// Context window budget in tokens (drives summarization)
    pub context_window: usize,

    /// Maximum LLM iterations per turn
    pub max_iterations: u32,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4".into(),
            context_window: 128_000,
            max_iterations: 10,
        }
    }
}

/// How one inbound message is processed.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Session identifier for history/context
    pub session_key: String,

    /// Target channel for tool execution and outbound messages
    pub channel: String,

    /// Target chat id
    pub chat_id: String,

    /// User message content
    pub user_message: String,

    /// Response used when the LLM returns empty content
    pub default_response: String,

    /// Whether to trigger summarization after the turn
    pub enable_summary: bool,

    /// Whether to publish tool output / final content from inside the turn
    pub send_response: bool,

    /// If true, skip history load/save and summarization (heartbeat turns)
    pub no_history: bool,
}

/// The core orchestrator.
pub struct AgentLoop {
    bus: Arc<MessageBus>,
    providers: Vec<Arc<dyn LlmProvider>>,
    model: String,
    max_iterations: u32,
    sessions: Arc<SessionStore>,
    backend: Option<Arc<dyn SessionBackend>>,
    state: Arc<StateManager>,
    tools: Arc<ToolRegistry>,
    context_builder: ContextBuilder,
    reasoning: ReasoningEngine,
    cache: ResponseCache,
    personality: Personality,
    summarizer: Arc<Summarizer>,
    events: Arc<EventBus>,
    message_tool: Option<Arc<MessageTool>>,
    cancel: CancellationToken,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentLoopConfig,
        providers: Vec<Arc<dyn LlmProvider>>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
        state: Arc<StateManager>,
        bus: Arc<MessageBus>,
        events: Arc<EventBus>,
        context_builder: ContextBuilder,
        personality: Personality,
        cancel: CancellationToken,
    ) -> Self {
        let summarizer = Arc::new(Summarizer::new(
            providers.clone(),
            config.model.clone(),
            config.context_window,
            sessions.clone(),
            None,
            events.clone(),
        ));

        Self {
            bus,
            providers,
            model: config.model,
            max_iterations: config.max_iterations,
            sessions,
            backend: None,
            state,
            tools,
            context_builder,
            reasoning: ReasoningEngine::new(),
            cache: ResponseCache::new(),
            personality,
            summarizer,
            events,
            message_tool: None,
            cancel,
        }
    }

    /// Attach a durable session backend.
    pub fn with_backend(mut self, backend: Arc<dyn SessionBackend>) -> Self {
        self.summarizer = Arc::new(self.summarizer.with_backend(backend.clone()));
        self.backend = Some(backend);
        self
    }

    /// Hand the loop its message-tool handle for duplicate suppression.
    pub fn with_message_tool(mut self, tool: Arc<MessageTool>) -> Self {
        self.message_tool = Some(tool);
        self
    }

    /// The registered tool names (for startup logging).
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.list()
    }

    /// Consume inbound messages until the cancellation token fires.
    ///
    /// The final response of each turn is published unless it is empty, the
    /// message tool already delivered during this round, or the content
    /// matches the internal tool-call format.
    pub async fn run(&self) {
        info!(tools = ?self.tools.list(), providers = self.providers.len(), "Agent loop started");

        while let Some(msg) = self.bus.consume_inbound(&self.cancel).await {
            let channel = msg.channel.clone();
            let chat_id = msg.chat_id.clone();

            let response = match self.process_message(msg).await {
                Ok(response) => response,
                Err(Error::Provider(e)) => {
                    // Surface provider exhaustion to the user as text.
                    format!("LLM request failed: {e}")
                }
                Err(e) => {
                    error!(error = %e, "Failed to process message");
                    continue;
                }
            };

            if response.is_empty() {
                continue;
            }

            if self
                .message_tool
                .as_ref()
                .is_some_and(|t| t.has_sent_in_round())
            {
                debug!("Message tool already delivered this round, skipping final publish");
                continue;
            }

            if self.is_tool_call_format(&response) {
                warn!("Suppressing tool-call-format leak in final response");
                continue;
            }

            self.bus
                .publish_outbound(
                    OutboundMessage {
                        channel,
                        chat_id,
                        content: response,
                    },
                    &self.cancel,
                )
                .await;
        }

        info!("Agent loop stopped");
    }

    /// Dispatch one inbound message: system notices vs. user turns.
    pub async fn process_message(&self, msg: InboundMessage) -> Result<String> {
        info!(
            channel = %msg.channel,
            sender_id = %msg.sender_id,
            session_key = %msg.session_key,
            preview = %truncate(&msg.content, 80),
            "Processing message"
        );

        self.events.publish(DomainEvent::MessageReceived {
            channel: msg.channel.clone(),
            sender_id: msg.sender_id.clone(),
            session_key: msg.session_key.clone(),
            timestamp: Utc::now(),
        });

        if msg.channel == SYSTEM_CHANNEL {
            return self.process_system_message(&msg);
        }

        self.run_agent_turn(TurnOptions {
            session_key: msg.session_key,
            channel: msg.channel,
            chat_id: msg.chat_id,
            user_message: msg.content,
            default_response: DEFAULT_RESPONSE.into(),
            enable_summary: true,
            send_response: false,
            no_history: false,
        })
        .await
    }

    /// Consume a subagent completion notice. Logged, never forwarded.
    fn process_system_message(&self, msg: &InboundMessage) -> Result<String> {
        if msg.channel != SYSTEM_CHANNEL {
            return Err(Error::Internal(format!(
                "process_system_message called with non-system channel: {}",
                msg.channel
            )));
        }

        // chat_id carries the origin as "channel:chat_id".
        let origin_channel = msg
            .chat_id
            .split_once(':')
            .map(|(channel, _)| channel)
            .unwrap_or("cli");

        let content = msg
            .content
            .split_once("Result:\n")
            .map(|(_, rest)| rest)
            .unwrap_or(&msg.content);

        if is_internal_channel(origin_channel) {
            info!(
                sender_id = %msg.sender_id,
                channel = origin_channel,
                content_len = content.len(),
                "Subagent completed (internal channel)"
            );
            return Ok(String::new());
        }

        info!(
            sender_id = %msg.sender_id,
            channel = origin_channel,
            content_len = content.len(),
            "Subagent completed"
        );
        Ok(String::new())
    }

    /// Run a heartbeat turn: stateless, never persisted, never summarized.
    pub async fn process_heartbeat(
        &self,
        content: impl Into<String>,
        channel: &str,
        chat_id: &str,
    ) -> Result<String> {
        self.run_agent_turn(TurnOptions {
            session_key: format!("{}{}", HEARTBEAT_PREFIX, Utc::now().timestamp()),
            channel: channel.into(),
            chat_id: chat_id.into(),
            user_message: content.into(),
            default_response: DEFAULT_RESPONSE.into(),
            enable_summary: false,
            send_response: false,
            no_history: true,
        })
        .await
    }

    /// Run a direct turn from the CLI (one-shot or interactive).
    pub async fn process_direct(&self, content: impl Into<String>, session_key: &str) -> Result<String> {
        self.process_message(InboundMessage {
            channel: "cli".into(),
            sender_id: "local".into(),
            chat_id: "direct".into(),
            content: content.into(),
            session_key: session_key.into(),
        })
        .await
    }

    /// The core turn algorithm.
    pub async fn run_agent_turn(&self, opts: TurnOptions) -> Result<String> {
        // 1. Record last-active channel (internal channels excluded).
        if !opts.channel.is_empty()
            && !opts.chat_id.is_empty()
            && !is_internal_channel(&opts.channel)
        {
            let channel_key = format!("{}:{}", opts.channel, opts.chat_id);
            if let Err(e) = self.state.set_last_channel(&channel_key) {
                warn!(error = %e, "Failed to record last channel");
            }
            if let Err(e) = self.state.set_last_chat_id(&opts.chat_id) {
                warn!(error = %e, "Failed to record last chat id");
            }
        }

        // Refresh tool contexts up front; this also clears the message
        // tool's per-round sent flag.
        self.tools.set_context_all(&opts.channel, &opts.chat_id);

        // 2. Classify.
        let (intent, confidence) = self.reasoning.analyze(&opts.user_message);
        debug!(intent = %intent, confidence, "Message classified");

        // 3. Cache probe.
        let cache_key = ResponseCache::key(intent, &opts.user_message);
        if intent != Intent::Complex {
            if let Some(cached) = self.cache.get(&cache_key) {
                info!(intent = %intent, "Response served from cache");
                if !opts.no_history {
                    self.record_exchange(&opts.session_key, &opts.user_message, &cached);
                }
                self.events.publish(DomainEvent::FastPathServed {
                    intent: intent.to_string(),
                    cached: true,
                    timestamp: Utc::now(),
                });
                return Ok(cached);
            }
        }

        // 4. Personality fast path.
        if confidence >= FAST_PATH_CONFIDENCE {
            if let Some(quick) = self.personality.generate(intent) {
                info!(intent = %intent, "Fast-path response");
                self.cache.set(&cache_key, &quick);
                if !opts.no_history {
                    self.record_exchange(&opts.session_key, &opts.user_message, &quick);
                }
                self.events.publish(DomainEvent::FastPathServed {
                    intent: intent.to_string(),
                    cached: false,
                    timestamp: Utc::now(),
                });
                return Ok(quick);
            }
        }

        // 5. LLM path: load context, append the user message.
        let (history, summary) = if opts.no_history {
            (Vec::new(), String::new())
        } else {
            (
                self.load_history(&opts.session_key).await,
                self.sessions.get_summary(&opts.session_key),
            )
        };

        let messages = self.context_builder.build_messages(
            &history,
            &summary,
            &opts.user_message,
            &opts.channel,
            &opts.chat_id,
        );

        if !opts.no_history {
            self.sessions
                .add_message(&opts.session_key, Role::User, &opts.user_message);
        }

        // 6. Iterate.
        let (final_content, iterations) = self.run_llm_iteration(messages, &opts).await?;

        // 7. Finalize.
        let final_content = if final_content.is_empty() {
            opts.default_response.clone()
        } else {
            final_content
        };

        if !opts.no_history {
            self.sessions
                .add_message(&opts.session_key, Role::Assistant, &final_content);
            self.sessions.save(&opts.session_key);
            self.mirror_to_backend(&opts.session_key).await;

            if opts.enable_summary {
                self.summarizer.maybe_schedule(&opts.session_key);
            }
        }

        if intent != Intent::Complex && final_content.len() < CACHEABLE_RESPONSE_CHARS {
            self.cache.set(&cache_key, &final_content);
        }

        if opts.send_response && !self.is_tool_call_format(&final_content) {
            self.bus
                .publish_outbound(
                    OutboundMessage {
                        channel: opts.channel.clone(),
                        chat_id: opts.chat_id.clone(),
                        content: final_content.clone(),
                    },
                    &self.cancel,
                )
                .await;
        }

        self.events.publish(DomainEvent::ResponseGenerated {
            session_key: opts.session_key.clone(),
            iterations,
            timestamp: Utc::now(),
        });

        info!(
            session_key = %opts.session_key,
            iterations,
            chars = final_content.len(),
            preview = %truncate(&final_content, 120),
            "Turn complete"
        );

        Ok(final_content)
    }

    /// Append a (user, assistant) pair and persist.
    fn record_exchange(&self, session_key: &str, user: &str, assistant: &str) {
        self.sessions.add_message(session_key, Role::User, user);
        self.sessions.add_message(session_key, Role::Assistant, assistant);
        self.sessions.save(session_key);
    }

    /// History from the durable store when connected, local otherwise.
    async fn load_history(&self, session_key: &str) -> Vec<Message> {
        if let Some(backend) = &self.backend {
            if backend.is_connected() {
                match backend.load_session(session_key).await {
                    Ok(history) => return history,
                    Err(e) => debug!(session_key, error = %e, "No session in backing store"),
                }
            }
        }
        self.sessions.get_history(session_key)
    }

    /// Mirror the local history to the durable store. Best effort.
    async fn mirror_to_backend(&self, session_key: &str) {
        if session_key.starts_with(HEARTBEAT_PREFIX) {
            return;
        }
        let Some(backend) = &self.backend else { return };
        if !backend.is_connected() {
            return;
        }
        let history = self.sessions.get_history(session_key);
        if let Err(e) = backend.save_session(session_key, &history).await {
            warn!(session_key, error = %e, "Failed to mirror session to store");
        }
    }

    /// The bounded "LLM → tool calls → tool results → LLM" iteration.
    async fn run_llm_iteration(
        &self,
        mut messages: Vec<Message>,
        opts: &TurnOptions,
    ) -> Result<(String, u32)> {
        if self.providers.is_empty() {
            return Err(Error::Config {
                message: "No LLM providers configured".into(),
            });
        }

        let tool_defs = self.tools.to_provider_defs();
        let params = ChatParams::default();
        let mut iteration = 0u32;
        let mut final_content = String::new();

        while iteration < self.max_iterations {
            iteration += 1;
            debug!(iteration, max = self.max_iterations, "LLM iteration");

            let response =
                chat_with_failover(&self.providers, &messages, &tool_defs, &self.model, &params)
                    .await
                    .map_err(Error::Provider)?;

            if response.tool_calls.is_empty() {
                final_content = response.content;
                info!(iteration, chars = final_content.len(), "LLM returned direct answer");
                break;
            }

            let tool_names: Vec<&str> =
                response.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
            info!(tools = ?tool_names, iteration, "LLM requested tool calls");

            let assistant =
                Message::assistant_with_tools(response.content.clone(), response.tool_calls.clone());
            messages.push(assistant.clone());
            if !opts.no_history {
                self.sessions.add_full_message(&opts.session_key, assistant);
            }

            // Execute each tool call in the order the LLM returned them,
            // appending one tool message per call right behind the
            // assistant message that requested it.
            for tc in &response.tool_calls {
                let result = self.dispatch_tool_call(tc, opts).await;
                let tool_msg = Message::tool_result(&tc.id, result.llm_content());
                messages.push(tool_msg.clone());
                if !opts.no_history {
                    self.sessions.add_full_message(&opts.session_key, tool_msg);
                }
            }
        }

        Ok((final_content, iteration))
    }

    async fn dispatch_tool_call(
        &self,
        tc: &hermitclaw_core::message::ToolCall,
        opts: &TurnOptions,
    ) -> ToolResult {
        info!(
            tool = %tc.name,
            args = %truncate(&tc.arguments.to_string(), 200),
            "Tool call"
        );

        let tool_name = tc.name.clone();
        let notifier: AsyncNotifier = Arc::new(move |result: ToolResult| {
            if !result.silent && !result.for_user.is_empty() {
                info!(
                    tool = %tool_name,
                    chars = result.for_user.len(),
                    "Async tool completed"
                );
            }
        });

        let start = Instant::now();
        let result = self
            .tools
            .execute_with_context(
                &tc.name,
                tc.arguments.clone(),
                &opts.channel,
                &opts.chat_id,
                Some(notifier),
            )
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: tc.name.clone(),
            success: result.error.is_none(),
            duration_ms,
            timestamp: Utc::now(),
        });

        if let Some(err) = &result.error {
            // The error string still goes back to the LLM so it can recover.
            warn!(tool = %tc.name, error = %err, "Tool execution failed");
        }

        // Stream tool output to the user immediately when permitted.
        if !result.silent && !result.for_user.is_empty() && opts.send_response {
            self.bus
                .publish_outbound(
                    OutboundMessage {
                        channel: opts.channel.clone(),
                        chat_id: opts.chat_id.clone(),
                        content: result.for_user.clone(),
                    },
                    &self.cancel,
                )
                .await;
        }

        result
    }

    /// Whether content looks like the internal tool-call syntax
    /// (`(<tool_name>={…`) some models leak instead of a proper call.
    fn is_tool_call_format(&self, content: &str) -> bool {
        if content.is_empty() {
            return false;
        }
        self.tools
            .list()
            .iter()
            .any(|name| content.contains(&format!("({name}={{")))
    }
}

/// Try each provider in order; the first success wins. The last provider's
/// error surfaces when every one fails.
pub(crate) async fn chat_with_failover(
    providers: &[Arc<dyn LlmProvider>],
    messages: &[Message],
    tools: &[ToolDefinition],
    model: &str,
    params: &ChatParams,
) -> std::result::Result<ChatResponse, ProviderError> {
    let mut last_error = ProviderError::NotConfigured("No providers in failover chain".into());

    for (i, provider) in providers.iter().enumerate() {
        if i > 0 {
            warn!(provider = provider.name(), attempt = i + 1, "Trying failover provider");
        }

        match provider.chat(messages, tools, model, params).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Provider failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
