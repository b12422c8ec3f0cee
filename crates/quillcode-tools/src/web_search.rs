//! Web search tool.
//!
//! The search itself is delegated to a hosted search endpoint speaking a
//! JSON-RPC `tools/call` shape; the base URL is overridable so tests can
//! point the tool at a local server.

use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const SEARCH_URL: &str = "https://mcp.exa.ai/mcp";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NUM_RESULTS: u64 = 8;

/// Search the web for information.
pub struct WebSearchTool {
    client: Client,
    base_url: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_base_url(SEARCH_URL)
    }

    /// Point the tool at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,
    params: RpcToolCall<'a>,
}

#[derive(Debug, Serialize)]
struct RpcToolCall<'a> {
    name: &'static str,
    arguments: &'a Value,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> ToolName {
        ToolName::WebSearch
    }

    fn description(&self) -> &str {
        r#"Search the web for information.

Use this tool when you need to:
- Find documentation for libraries or frameworks
- Look up current information that may not be in your training data
- Find solutions to specific technical problems"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of search results to return (default: 8)",
                    "default": 8,
                    "minimum": 1,
                    "maximum": 20
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let query = args["query"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "query"))?
            .to_string();
        let num_results = args["num_results"].as_u64().unwrap_or(DEFAULT_NUM_RESULTS);

        debug!(query = %query, "Executing web search");

        let arguments = json!({
            "query": query,
            "numResults": num_results,
        });
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/call",
            params: RpcToolCall {
                name: "web_search",
                arguments: &arguments,
            },
        };

        let send = async {
            let response = self
                .client
                .post(&self.base_url)
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .json(&request)
                .send()
                .await
                .map_err(|e| ToolError::execution_failed(format!("Search request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(ToolError::execution_failed(format!(
                    "Search endpoint returned status {}",
                    response.status()
                )));
            }

            let envelope: Value = response
                .json()
                .await
                .map_err(|e| ToolError::execution_failed(format!("Invalid search response: {e}")))?;

            // JSON-RPC result with content blocks; fall back to the raw
            // result when the endpoint returns plain text.
            let text = envelope["result"]["content"]
                .as_array()
                .map(|blocks| {
                    blocks
                        .iter()
                        .filter_map(|block| block["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .filter(|text| !text.is_empty())
                .or_else(|| envelope["result"].as_str().map(str::to_string))
                .unwrap_or_else(|| envelope.to_string());

            Ok(text)
        };

        let text = tokio::select! {
            _ = ctx.abort.cancelled() => return Err(ToolError::Cancelled),
            result = send => result?,
        };

        Ok(
            ToolOutput::new(format!("Web search: {query}"), text).with_metadata(json!({
                "query": query,
                "num_results": num_results,
            })),
        )
    }
}
