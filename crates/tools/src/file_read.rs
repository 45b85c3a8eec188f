//! Read a file from the workspace.

use async_trait::async_trait;

use hermitclaw_core::tool::{Tool, ToolContext, ToolResult};

use crate::PathScope;

/// Maximum bytes returned in one read; larger files are truncated.
const MAX_READ_BYTES: usize = 100_000;

pub struct FileReadTool {
    scope: PathScope,
}

impl FileReadTool {
    pub fn new(scope: PathScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Paths are relative to the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let Some(path) = arguments["path"].as_str() else {
            return ToolResult::err("Missing 'path' argument");
        };

        let resolved = match self.scope.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        match tokio::fs::read_to_string(&resolved).await {
            Ok(mut content) => {
                if content.len() > MAX_READ_BYTES {
                    content.truncate(MAX_READ_BYTES);
                    content.push_str("\n[... truncated]");
                }
                ToolResult::for_llm(content)
            }
            Err(e) => ToolResult::err(format!("Failed to read {path}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_workspace_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "remember the milk").unwrap();

        let tool = FileReadTool::new(PathScope::new(dir.path(), true));
        let result = tool
            .execute(serde_json::json!({"path": "note.txt"}), &ToolContext::default())
            .await;
        assert_eq!(result.for_llm, "remember the milk");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let tool = FileReadTool::new(PathScope::new(dir.path(), true));
        let result = tool
            .execute(serde_json::json!({"path": "ghost.txt"}), &ToolContext::default())
            .await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn refuses_escape() {
        let dir = tempdir().unwrap();
        let tool = FileReadTool::new(PathScope::new(dir.path(), true));
        let result = tool
            .execute(
                serde_json::json!({"path": "../../etc/passwd"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_some());
    }
}
