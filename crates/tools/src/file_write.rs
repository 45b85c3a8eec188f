//! Write or append to a file in the workspace.

use async_trait::async_trait;

use hermitclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::PathScope;

pub struct FileWriteTool {
    scope: PathScope,
}

impl FileWriteTool {
    pub fn new(scope: PathScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. \
         Set append=true to add to the end instead of overwriting."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwrite (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let Some(path) = arguments["path"].as_str() else {
            return ToolResult::err("Missing 'path' argument");
        };
        let Some(content) = arguments["content"].as_str() else {
            return ToolResult::err("Missing 'content' argument");
        };
        let append = arguments["append"].as_bool().unwrap_or(false);

        let resolved = match self.scope.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::err(format!("Failed to create directories: {e}"));
            }
        }

        let result = if append {
            use tokio::io::AsyncWriteExt;
            match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
            {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            tokio::fs::write(&resolved, content).await
        };

        match result {
            Ok(()) => ToolResult::for_llm(format!(
                "{} {} bytes to {path}",
                if append { "Appended" } else { "Wrote" },
                content.len()
            )),
            Err(e) => ToolResult::err(format!("Failed to write {path}: {e}")),
        }
    }
}
