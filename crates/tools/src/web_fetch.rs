//! Fetch a URL and return its body, size-capped.

use async_trait::async_trait;
use tracing::debug;

use hermitclaw_core::tool::{Tool, ToolContext, ToolResult};

/// Maximum characters returned to the LLM per fetch.
const MAX_BODY_CHARS: usize = 50_000;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("hermitclaw/0.3")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the contents of a URL (HTTP GET). Large responses are truncated."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (http or https)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let Some(url) = arguments["url"].as_str() else {
            return ToolResult::err("Missing 'url' argument");
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolResult::err(format!("Unsupported URL scheme: {url}"));
        }

        debug!(url, "Fetching URL");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Fetch failed: {e}")),
        };

        let status = response.status();
        let mut body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(format!("Failed to read body: {e}")),
        };

        if body.len() > MAX_BODY_CHARS {
            // Truncate on a char boundary.
            let mut cut = MAX_BODY_CHARS;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("\n[... truncated]");
        }

        if status.is_success() {
            ToolResult::for_llm(body)
        } else {
            ToolResult::err(format!("HTTP {status}: {body}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let tool = WebFetchTool::new();
        let result = tool
            .execute(
                serde_json::json!({"url": "file:///etc/passwd"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn missing_url_is_an_error() {
        let tool = WebFetchTool::new();
        let result = tool.execute(serde_json::json!({}), &ToolContext::default()).await;
        assert!(result.error.is_some());
    }
}
