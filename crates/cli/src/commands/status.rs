//! `hermitclaw status` — Show system status.

use hermitclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🦀 HermitClaw Status");
    println!("====================");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  Workspace:   {}", config.workspace_path().display());
    println!("  Model:       {}", config.agents.model);
    println!("  Providers:   {}", provider_summary(&config));
    println!("  Max iters:   {}", config.agents.max_tool_iterations);
    println!("  Personality: {} (emojis: {})", config.personality.name, config.personality.use_emojis);
    println!(
        "  Heartbeat:   {}",
        if config.heartbeat.enabled {
            format!("every {} min", config.heartbeat.interval_minutes)
        } else {
            "disabled".into()
        }
    );
    println!(
        "  Database:    {}",
        if config.database.url.is_some() {
            "configured"
        } else {
            "none (local sessions only)"
        }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `hermitclaw onboard` first");
    }

    Ok(())
}

fn provider_summary(config: &AppConfig) -> String {
    if config.providers.is_empty() {
        return "none configured".into();
    }
    config
        .providers
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(" → ")
}
