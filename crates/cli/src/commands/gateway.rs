//! `hermitclaw gateway` — Start transports + the agent loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hermitclaw_agent::{AgentLoop, DEFAULT_RESPONSE};
use hermitclaw_bus::{MessageBus, OutboundMessage};
use hermitclaw_channels::{ChannelRegistry, CliChannel};
use hermitclaw_config::AppConfig;
use hermitclaw_state::StateManager;

use super::wiring;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = wiring::build(&config).await?;

    println!("🦀 HermitClaw Gateway");
    println!("   Workspace: {}", config.workspace_path().display());
    println!(
        "   Heartbeat: {}",
        if config.heartbeat.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    // Transports. The CLI adapter is always available; other channels come
    // from config (only names with an adapter in this build are honored).
    let mut channels = ChannelRegistry::new();
    channels.register(Arc::new(CliChannel::new()));
    for (name, channel_config) in &config.channels {
        if channel_config.enabled && name != "cli" {
            warn!(channel = %name, "No adapter built in for channel, skipping");
        }
    }

    let channels = Arc::new(channels);
    channels
        .start_all(runtime.bus.clone(), runtime.cancel.clone())
        .await?;

    // Outbound dispatcher: bus → adapters.
    {
        let channels = channels.clone();
        let bus = runtime.bus.clone();
        let cancel = runtime.cancel.clone();
        tokio::spawn(async move {
            channels.run_outbound_dispatch(bus, cancel).await;
        });
    }

    // Domain event log: what the loop is doing, at debug level.
    {
        let mut events = runtime.events.subscribe();
        let cancel = runtime.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => tracing::debug!(?event, "Domain event"),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    // Heartbeat scheduler.
    if config.heartbeat.enabled {
        spawn_heartbeat(
            runtime.agent.clone(),
            runtime.bus.clone(),
            runtime.state.clone(),
            config.heartbeat.interval_minutes,
            config.heartbeat.prompt.clone(),
            runtime.cancel.clone(),
        );
    }

    // Ctrl-C triggers a clean shutdown.
    {
        let cancel = runtime.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                cancel.cancel();
            }
        });
    }

    println!("   Ready. Type a message (or /quit to exit).\n");
    runtime.agent.run().await;

    channels.stop_all().await;
    Ok(())
}

/// Run heartbeat turns on an interval; non-trivial results go to the last
/// active channel.
fn spawn_heartbeat(
    agent: Arc<AgentLoop>,
    bus: Arc<MessageBus>,
    state: Arc<StateManager>,
    interval_minutes: u32,
    prompt: String,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let period = Duration::from_secs(u64::from(interval_minutes) * 60);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // First tick fires immediately; skip it.

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => break,
            }

            // Deliver to whoever talked to the agent most recently.
            let Some(last) = state.last_channel() else {
                info!("Heartbeat skipped: no last channel recorded");
                continue;
            };
            let Some((channel, chat_id)) = last.split_once(':') else {
                warn!(last = %last, "Malformed last channel record");
                continue;
            };

            match agent.process_heartbeat(prompt.clone(), channel, chat_id).await {
                Ok(result) => {
                    if result.is_empty() || result == DEFAULT_RESPONSE {
                        info!("Heartbeat completed with nothing to report");
                        continue;
                    }
                    bus.publish_outbound(
                        OutboundMessage {
                            channel: channel.to_string(),
                            chat_id: chat_id.to_string(),
                            content: result,
                        },
                        &cancel,
                    )
                    .await;
                }
                Err(e) => warn!(error = %e, "Heartbeat turn failed"),
            }
        }
    });
}
