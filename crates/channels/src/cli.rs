//! CLI channel — interactive terminal-based chat.
//!
//! The simplest transport: reads from stdin, writes to stdout. Used by
//! `hermitclaw agent` interactive mode and as the reference adapter for the
//! Channel contract.

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use hermitclaw_core::channel::{Channel, ChannelMessage};
use hermitclaw_core::error::ChannelError;

/// Chat id used for all terminal interaction.
pub const CLI_CHAT_ID: &str = "direct";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ChannelMessage>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if line == "/quit" || line == "/exit" {
                            break;
                        }

                        let msg = ChannelMessage {
                            sender_id: "local".into(),
                            chat_id: CLI_CHAT_ID.into(),
                            content: line,
                        };
                        if tx.send(msg).await.is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Ok(None) | Err(_) => break, // stdin closed
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<(), ChannelError> {
        let mut stdout = io::stdout();
        let line = format!("\n{content}\n> ");
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "cli".into(),
                reason: e.to_string(),
            })?;
        stdout.flush().await.ok();
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // The local terminal user is always trusted
    }
}
