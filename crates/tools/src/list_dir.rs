//! List a directory in the workspace.

use async_trait::async_trait;

use hermitclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::PathScope;

pub struct ListDirTool {
    scope: PathScope,
}

impl ListDirTool {
    pub fn new(scope: PathScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Defaults to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let path = arguments["path"].as_str().unwrap_or(".");

        let resolved = match self.scope.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        let mut entries = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => return ToolResult::err(format!("Failed to list {path}: {e}")),
        };

        let mut lines = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => "/",
                _ => "",
            };
            lines.push(format!("{name}{suffix}"));
        }
        lines.sort();

        if lines.is_empty() {
            ToolResult::for_llm("(empty directory)")
        } else {
            ToolResult::for_llm(lines.join("\n"))
        }
    }
}
