//! `hermitclaw agent` — Terminal chat with the agent.

use hermitclaw_config::AppConfig;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::wiring;

/// Session key for all direct terminal conversations.
const CLI_SESSION: &str = "cli:direct";

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = wiring::build(&config).await?;

    // One-shot mode.
    if let Some(message) = message {
        let response = runtime.agent.process_direct(message, CLI_SESSION).await?;
        println!("{response}");
        runtime.cancel.cancel();
        return Ok(());
    }

    // Interactive mode.
    println!("🦀 HermitClaw — interactive chat (Ctrl-D or /quit to exit)\n");
    let stdin = io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();
    let mut stdout = io::stdout();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        match runtime.agent.process_direct(line, CLI_SESSION).await {
            Ok(response) => println!("\n{response}\n"),
            Err(e) => eprintln!("\nerror: {e}\n"),
        }

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    runtime.cancel.cancel();
    println!("Goodbye!");
    Ok(())
}
