//! Shared runtime assembly: config → bus, providers, tools, stores, loop.
//!
//! Both `agent` and `gateway` build the same runtime; they differ only in
//! which transports they attach. The core reads no environment variables —
//! everything it needs is injected here.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hermitclaw_agent::{
    AgentLoop, AgentLoopConfig, ContextBuilder, Personality, SpawnTool, SubagentManager,
    SubagentTool,
};
use hermitclaw_bus::MessageBus;
use hermitclaw_config::AppConfig;
use hermitclaw_core::{EventBus, LlmProvider};
use hermitclaw_providers::OpenAiCompatProvider;
use hermitclaw_session::SessionStore;
use hermitclaw_state::StateManager;
use hermitclaw_tools::{default_registry, MessageTool, SendCallback};

/// Everything a command needs to run the agent.
pub struct Runtime {
    pub bus: Arc<MessageBus>,
    pub agent: Arc<AgentLoop>,
    pub state: Arc<StateManager>,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
}

/// Assemble the full runtime from configuration.
pub async fn build(config: &AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let workspace = config.workspace_path();
    std::fs::create_dir_all(&workspace)?;

    let cancel = CancellationToken::new();
    let bus = Arc::new(MessageBus::new());
    let events = Arc::new(EventBus::default());

    // Ordered provider failover chain.
    let providers = build_providers(config)?;
    if providers.is_empty() {
        return Err("No LLM providers configured — set HERMITCLAW_API_KEY or add a \
                    [[providers]] entry to config.toml"
            .into());
    }

    let sessions = Arc::new(SessionStore::new(workspace.join("sessions")));
    let state = Arc::new(StateManager::new(&workspace));

    let send = bus_send_callback(bus.clone(), cancel.clone());
    let restrict = config.agents.restrict_to_workspace;

    let loop_config = AgentLoopConfig {
        model: config.agents.model.clone(),
        context_window: config.agents.context_window,
        max_iterations: config.agents.max_tool_iterations,
    };
    let personality = Personality::new(
        config.personality.name.clone(),
        config.personality.use_emojis,
    );

    // Child (subagent) loop: same stack, its own message tool, and a
    // registry that never sees spawn/subagent.
    let child_message_tool = Arc::new(MessageTool::new(send.clone()));
    let child_tools = Arc::new(default_registry(
        &workspace,
        restrict,
        child_message_tool.clone(),
    ));
    let child = Arc::new(
        AgentLoop::new(
            loop_config.clone(),
            providers.clone(),
            child_tools.clone(),
            sessions.clone(),
            state.clone(),
            bus.clone(),
            events.clone(),
            ContextBuilder::new(&workspace, &config.personality.name)
                .with_tools(child_tools.list()),
            personality.clone(),
            cancel.clone(),
        )
        .with_message_tool(child_message_tool),
    );
    let subagents = Arc::new(SubagentManager::new(child, bus.clone(), cancel.clone()));

    // Main registry: built-ins plus the subagent tools.
    let message_tool = Arc::new(MessageTool::new(send));
    let mut registry = default_registry(&workspace, restrict, message_tool.clone());
    registry.register(Arc::new(SpawnTool::new(subagents.clone())));
    registry.register(Arc::new(SubagentTool::new(subagents)));
    let tools = Arc::new(registry);

    let mut agent = AgentLoop::new(
        loop_config,
        providers,
        tools.clone(),
        sessions,
        state.clone(),
        bus.clone(),
        events.clone(),
        ContextBuilder::new(&workspace, &config.personality.name).with_tools(tools.list()),
        personality,
        cancel.clone(),
    )
    .with_message_tool(message_tool);

    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database.url {
        match hermitclaw_session::PostgresBackend::connect(url).await {
            Ok(backend) => {
                info!("Durable session store connected");

                // Register this process in the store's machine_state record.
                let machine = hermitclaw_session::MachineState {
                    id: "default".into(),
                    name: config.personality.name.clone(),
                    data: serde_json::json!({
                        "workspace": workspace.display().to_string(),
                        "model": config.agents.model,
                    }),
                    ..Default::default()
                };
                if let Err(e) = backend.save_machine_state(&machine).await {
                    warn!(error = %e, "Failed to record machine state");
                }

                agent = agent.with_backend(Arc::new(backend));
            }
            Err(e) => {
                // The in-memory/file store stays authoritative.
                warn!(error = %e, "Durable store unavailable, continuing without it");
            }
        }
    }

    info!(
        workspace = %workspace.display(),
        tools = ?tools.list(),
        "Runtime assembled"
    );

    Ok(Runtime {
        bus,
        agent: Arc::new(agent),
        state,
        events,
        cancel,
    })
}

fn build_providers(
    config: &AppConfig,
) -> Result<Vec<Arc<dyn LlmProvider>>, Box<dyn std::error::Error>> {
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    for entry in &config.providers {
        let key = entry.api_key.clone().unwrap_or_default();
        let provider = match (entry.name.as_str(), &entry.api_url) {
            ("openrouter", None) => OpenAiCompatProvider::openrouter(key)?,
            ("openai", None) => OpenAiCompatProvider::openai(key)?,
            ("ollama", url) => OpenAiCompatProvider::ollama(url.as_deref())?,
            (name, Some(url)) => OpenAiCompatProvider::new(name, url, key)?,
            (name, None) => {
                warn!(provider = name, "Skipping provider without api_url");
                continue;
            }
        };
        providers.push(Arc::new(provider));
    }

    Ok(providers)
}

/// Message-tool delivery goes straight onto the outbound queue.
fn bus_send_callback(bus: Arc<MessageBus>, cancel: CancellationToken) -> SendCallback {
    Arc::new(move |msg| {
        let bus = bus.clone();
        let cancel = cancel.clone();
        Box::pin(async move {
            bus.publish_outbound(msg, &cancel).await;
        })
    })
}
