//! HTTP gateway implementation (Anthropic-shaped messages API).

use crate::{
    error::GatewayError, message::ContentBlock, model::ModelInfo, stream::FinishReason,
    ApiRequest, ApiResponse, GatewayResult, ToolDefinition, Usage,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// The default API base URL.
const API_URL: &str = "https://api.anthropic.com";

/// The API version header value.
const API_VERSION: &str = "2023-06-01";

/// Callback invoked when the provider reports remaining account credit.
pub type CreditReporter = Arc<dyn Fn(f64) + Send + Sync>;

/// HTTP gateway to an Anthropic-shaped messages endpoint.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    model: ModelInfo,
    credit_reporter: Option<CreditReporter>,
}

impl HttpGateway {
    /// Create a new gateway with an API key.
    pub fn new(api_key: &str, model: ModelInfo) -> GatewayResult<Self> {
        Self::with_base_url(api_key, API_URL, model)
    }

    /// Create a new gateway with a custom base URL.
    pub fn with_base_url(api_key: &str, base_url: &str, model: ModelInfo) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| GatewayError::Unauthorized)?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        debug!(model = %model.id, "Creating HTTP gateway");

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            credit_reporter: None,
        })
    }

    /// Report remaining account credit through the given callback when the
    /// provider includes it in the response envelope.
    pub fn with_credit_reporter(mut self, reporter: CreditReporter) -> Self {
        self.credit_reporter = Some(reporter);
        self
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters
                })
            })
            .collect()
    }

    fn build_body(&self, request: &ApiRequest) -> GatewayResult<Value> {
        let mut body = json!({
            "model": self.model.id,
            "max_tokens": request.max_tokens.unwrap_or(self.model.limit.output),
            "messages": serde_json::to_value(&request.messages)?,
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(Self::convert_tools(&request.tools));
        }

        Ok(body)
    }

    fn parse_response(&self, envelope: Value) -> GatewayResult<ApiResponse> {
        let content_value = envelope
            .get("content")
            .ok_or_else(|| GatewayError::invalid_response("missing content"))?;

        let mut content = Vec::new();
        for block in content_value
            .as_array()
            .ok_or_else(|| GatewayError::invalid_response("content is not an array"))?
        {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    let text = block
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    content.push(ContentBlock::text(text));
                }
                Some("tool_use") => {
                    let id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| GatewayError::invalid_response("tool_use without id"))?;
                    let name = block
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| GatewayError::invalid_response("tool_use without name"))?;
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    content.push(ContentBlock::tool_use(id, name, input));
                }
                other => {
                    // Thinking blocks and future content types are not part of
                    // the history; skip them.
                    debug!(block_type = ?other, "Skipping unsupported content block");
                }
            }
        }

        let usage = envelope
            .get("usage")
            .map(|u| Usage {
                input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0)
                    as u32,
                cache_read_tokens: u
                    .get("cache_read_input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                cache_write_tokens: u
                    .get("cache_creation_input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        let finish_reason = envelope
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(FinishReason::parse)
            .unwrap_or_default();

        if let Some(reporter) = &self.credit_reporter {
            if let Some(balance) = envelope.get("credit_balance").and_then(Value::as_f64) {
                reporter(balance);
            }
        }

        Ok(ApiResponse {
            content,
            usage,
            finish_reason,
        })
    }

    async fn send_inner(&self, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        let body = self.build_body(request)?;
        let url = format!("{}/v1/messages", self.base_url);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(text);
            warn!(status = status.as_u16(), %message, "Model request failed");
            return Err(GatewayError::from_status(status.as_u16(), message));
        }

        let envelope: Value = response.json().await?;
        self.parse_response(envelope)
    }
}

#[async_trait]
impl crate::LanguageGateway for HttpGateway {
    async fn send(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        match &request.abort {
            Some(token) => {
                let token = token.clone();
                tokio::select! {
                    _ = token.cancelled() => Err(GatewayError::Cancelled),
                    result = self.send_inner(&request) => result,
                }
            }
            None => self.send_inner(&request).await,
        }
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model
    }

    fn provider_id(&self) -> &str {
        &self.model.provider_id
    }
}
