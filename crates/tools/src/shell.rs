//! Shell tool — execute system commands.
//!
//! Supports command allowlisting, workspace-scoped working directory, and
//! stdout/stderr capture. Failures never abort the turn: everything comes
//! back inside the ToolResult so the LLM can recover.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use hermitclaw_core::tool::{Tool, ToolContext, ToolResult};

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    workdir: PathBuf,
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(workdir: PathBuf, allowed_commands: Vec<String>) -> Self {
        Self {
            workdir,
            allowed_commands,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running \
         programs, checking files, git operations, etc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let Some(command) = arguments["command"].as_str() else {
            return ToolResult::err("Missing 'command' argument");
        };

        if !self.is_command_allowed(command) {
            let base = command.split_whitespace().next().unwrap_or("");
            return ToolResult::err(format!("Command '{base}' not in allowlist"));
        }

        debug!(command = %command, "Executing shell command");

        let output = if cfg!(target_os = "windows") {
            Command::new("cmd")
                .args(["/C", command])
                .current_dir(&self.workdir)
                .output()
                .await
        } else {
            Command::new("sh")
                .args(["-c", command])
                .current_dir(&self.workdir)
                .output()
                .await
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                let mut combined = stdout;
                if !stderr.is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str("stderr:\n");
                    combined.push_str(&stderr);
                }
                if combined.is_empty() {
                    combined = "(no output)".into();
                }

                if output.status.success() {
                    ToolResult::for_llm(combined)
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    ToolResult::err(format!("Command exited with status {code}:\n{combined}"))
                }
            }
            Err(e) => ToolResult::err(format!("Failed to spawn command: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tool(allowed: Vec<String>) -> (ShellTool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (ShellTool::new(dir.path().to_path_buf(), allowed), dir)
    }

    #[tokio::test]
    async fn runs_allowed_command() {
        let (tool, _dir) = tool(vec!["echo".into()]);
        let result = tool
            .execute(
                serde_json::json!({"command": "echo hello"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_none());
        assert!(result.for_llm.contains("hello"));
    }

    #[tokio::test]
    async fn blocks_disallowed_command() {
        let (tool, _dir) = tool(vec!["echo".into()]);
        let result = tool
            .execute(
                serde_json::json!({"command": "rm -rf /"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_some());
        assert!(result.error.unwrap().contains("allowlist"));
    }

    #[tokio::test]
    async fn empty_allowlist_allows_everything() {
        let (tool, _dir) = tool(vec![]);
        let result = tool
            .execute(
                serde_json::json!({"command": "echo unrestricted"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_reports_error() {
        let (tool, _dir) = tool(vec!["sh".into(), "false".into()]);
        let result = tool
            .execute(
                serde_json::json!({"command": "false"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn runs_in_workdir() {
        let (tool, dir) = tool(vec!["pwd".into()]);
        let result = tool
            .execute(serde_json::json!({"command": "pwd"}), &ToolContext::default())
            .await;
        let canonical = dir.path().canonicalize().unwrap();
        assert!(result.for_llm.contains(canonical.to_str().unwrap()));
    }
}
