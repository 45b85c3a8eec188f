//! Subagent manager — child agents with a structurally restricted tool set.
//!
//! A child agent shares the parent's providers, workspace, session store,
//! and bus, but its registry is built WITHOUT the `spawn`/`subagent` tools,
//! so the agent hierarchy is bounded by construction rather than by a
//! runtime depth counter.
//!
//! Two entry points: `run_sync` (the parent turn awaits the child) and
//! `spawn` (fire-and-forget; the child posts a system-channel completion
//! notice carrying the parent's origin so the loop can log it, and may
//! message the user directly through its own message tool).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use hermitclaw_bus::{InboundMessage, MessageBus};
use hermitclaw_core::tool::{ContextualTool, Tool, ToolContext, ToolResult};
use hermitclaw_core::SYSTEM_CHANNEL;

use crate::loop_runner::{AgentLoop, TurnOptions, DEFAULT_RESPONSE};

/// Runs child agent turns against a restricted tool registry.
pub struct SubagentManager {
    /// Child loop sharing providers/sessions/bus, minus spawn/subagent.
    child: Arc<AgentLoop>,
    bus: Arc<MessageBus>,
    cancel: CancellationToken,
}

impl SubagentManager {
    /// Build a manager around an already-restricted child loop.
    ///
    /// The caller guarantees the child's registry excludes `spawn` and
    /// `subagent`.
    pub fn new(child: Arc<AgentLoop>, bus: Arc<MessageBus>, cancel: CancellationToken) -> Self {
        Self { child, bus, cancel }
    }

    fn new_task_id() -> String {
        let id = Uuid::new_v4().to_string();
        format!("subagent:{}", &id[..8])
    }

    /// Run a child turn and wait for its final answer.
    pub async fn run_sync(&self, task: &str, channel: &str, chat_id: &str) -> String {
        let session_key = Self::new_task_id();
        info!(session_key = %session_key, "Running synchronous subagent");

        match self
            .child
            .run_agent_turn(TurnOptions {
                session_key,
                channel: channel.to_string(),
                chat_id: chat_id.to_string(),
                user_message: task.to_string(),
                default_response: DEFAULT_RESPONSE.into(),
                enable_summary: false,
                send_response: false,
                no_history: false,
            })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Subagent turn failed");
                format!("Subagent failed: {e}")
            }
        }
    }

    /// Fire a child turn in the background, returning its task id.
    ///
    /// On completion a system-channel notice is published and the caller's
    /// async notifier (if any) is invoked with the child's result.
    pub fn spawn(
        &self,
        task: &str,
        channel: &str,
        chat_id: &str,
        notify: Option<hermitclaw_core::tool::AsyncNotifier>,
    ) -> String {
        let task_id = Self::new_task_id();
        info!(task_id = %task_id, "Spawning background subagent");

        let child = self.child.clone();
        let bus = self.bus.clone();
        let cancel = self.cancel.clone();
        let task = task.to_string();
        let origin_channel = channel.to_string();
        let origin_chat = chat_id.to_string();
        let id = task_id.clone();

        tokio::spawn(async move {
            let result = match child
                .run_agent_turn(TurnOptions {
                    session_key: id.clone(),
                    channel: origin_channel.clone(),
                    chat_id: origin_chat.clone(),
                    user_message: task.clone(),
                    default_response: DEFAULT_RESPONSE.into(),
                    enable_summary: false,
                    send_response: false,
                    no_history: false,
                })
                .await
            {
                Ok(result) => result,
                Err(e) => format!("Subagent failed: {e}"),
            };

            if let Some(notify) = notify {
                notify(ToolResult::for_both(
                    format!("Subagent {id} finished."),
                    result.clone(),
                ));
            }

            bus.publish_inbound(
                InboundMessage {
                    channel: SYSTEM_CHANNEL.into(),
                    sender_id: id.clone(),
                    chat_id: format!("{origin_channel}:{origin_chat}"),
                    content: format!(
                        "Subagent task completed.\nTask: {task}\nResult:\n{result}"
                    ),
                    session_key: id,
                },
                &cancel,
            )
            .await;
        });

        task_id
    }
}

/// Contextual target shared by the spawn/subagent tools.
#[derive(Default)]
struct Target {
    inner: Mutex<(String, String)>,
}

impl Target {
    fn set(&self, channel: &str, chat_id: &str) {
        *self.inner.lock().unwrap() = (channel.to_string(), chat_id.to_string());
    }

    fn resolve(&self, ctx: &ToolContext) -> (String, String) {
        let (channel, chat_id) = self.inner.lock().unwrap().clone();
        if channel.is_empty() {
            (ctx.channel.clone(), ctx.chat_id.clone())
        } else {
            (channel, chat_id)
        }
    }
}

/// Fire-and-forget child agent tool (main agent only).
pub struct SpawnTool {
    manager: Arc<SubagentManager>,
    target: Target,
}

impl SpawnTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self {
            manager,
            target: Target::default(),
        }
    }
}

#[async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Start a background subagent for a long-running task. Returns immediately \
         with a task id; the subagent reports its result when done."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task for the subagent to perform"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let Some(task) = arguments["task"].as_str() else {
            return ToolResult::err("Missing 'task' argument");
        };

        let (channel, chat_id) = self.target.resolve(ctx);
        let task_id = self
            .manager
            .spawn(task, &channel, &chat_id, ctx.notify.clone());

        ToolResult::for_llm(format!(
            "Started background subagent {task_id}. It will report when finished."
        ))
    }

    fn as_contextual(&self) -> Option<&dyn ContextualTool> {
        Some(self)
    }
}

impl ContextualTool for SpawnTool {
    fn set_context(&self, channel: &str, chat_id: &str) {
        self.target.set(channel, chat_id);
    }
}

/// Synchronous child agent tool (main agent only).
pub struct SubagentTool {
    manager: Arc<SubagentManager>,
    target: Target,
}

impl SubagentTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self {
            manager,
            target: Target::default(),
        }
    }
}

#[async_trait]
impl Tool for SubagentTool {
    fn name(&self) -> &str {
        "subagent"
    }

    fn description(&self) -> &str {
        "Delegate a task to a subagent and wait for its result. Use for focused \
         subtasks that benefit from a clean context."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task for the subagent to perform"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let Some(task) = arguments["task"].as_str() else {
            return ToolResult::err("Missing 'task' argument");
        };

        let (channel, chat_id) = self.target.resolve(ctx);
        let result = self.manager.run_sync(task, &channel, &chat_id).await;
        ToolResult::for_llm(result)
    }

    fn as_contextual(&self) -> Option<&dyn ContextualTool> {
        Some(self)
    }
}

impl ContextualTool for SubagentTool {
    fn set_context(&self, channel: &str, chat_id: &str) {
        self.target.set(channel, chat_id);
    }
}
