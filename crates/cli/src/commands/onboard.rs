//! `hermitclaw onboard` — First-time setup.

use hermitclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let workspace_dir = AppConfig::default().workspace_path();

    println!("🦀 HermitClaw — First-Time Setup");
    println!("================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    }

    if !config_path.exists() {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created default config: {}", config_path.display());
    } else {
        println!("  Config file exists: {}", config_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Set an API key:  export HERMITCLAW_API_KEY=sk-...");
    println!("     (or add a [[providers]] entry to config.toml)");
    println!("  2. Chat:            hermitclaw agent");
    println!("  3. Run the gateway: hermitclaw gateway");

    Ok(())
}
