//! Scripted gateway for tests.
//!
//! The mock replays a queue of pre-programmed results and records every
//! request it receives, so engine tests can drive multi-round-trip scenarios
//! without a network.

use crate::{
    error::GatewayError, message::ContentBlock, model::ModelInfo, ApiRequest, ApiResponse,
    FinishReason, GatewayResult, LanguageGateway, Usage,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A scripted result: a response, or an error to surface.
pub enum ScriptedResult {
    Ok(ApiResponse),
    Err(GatewayError),
}

/// A scripted language gateway.
pub struct MockGateway {
    model: ModelInfo,
    script: Mutex<VecDeque<ScriptedResult>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
    /// Create an empty mock with default model info.
    pub fn new() -> Self {
        Self {
            model: ModelInfo::new("mock-model", "mock").with_limit(crate::ModelLimit {
                context: 200_000,
                output: 8_192,
            }),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with specific model info.
    pub fn with_model(model: ModelInfo) -> Self {
        Self {
            model,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a full response.
    pub fn push_response(&self, response: ApiResponse) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedResult::Ok(response));
    }

    /// Queue a text-only response ending the turn.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(ApiResponse {
            content: vec![ContentBlock::text(text)],
            usage: Usage::new(10, 10),
            finish_reason: FinishReason::EndTurn,
        });
    }

    /// Queue a response containing a single tool call.
    pub fn push_tool_call(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) {
        self.push_response(ApiResponse {
            content: vec![
                ContentBlock::text("Working on it."),
                ContentBlock::tool_use(id, name, input),
            ],
            usage: Usage::new(10, 10),
            finish_reason: FinishReason::ToolUse,
        });
    }

    /// Queue an empty-content response (provider anomaly).
    pub fn push_empty(&self) {
        self.push_response(ApiResponse {
            content: Vec::new(),
            usage: Usage::new(10, 0),
            finish_reason: FinishReason::EndTurn,
        });
    }

    /// Queue an error.
    pub fn push_error(&self, error: GatewayError) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedResult::Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageGateway for MockGateway {
    async fn send(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        if let Some(token) = &request.abort {
            if token.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
        }

        self.requests
            .lock()
            .expect("requests lock")
            .push(request);

        match self.script.lock().expect("script lock").pop_front() {
            Some(ScriptedResult::Ok(response)) => Ok(response),
            Some(ScriptedResult::Err(error)) => Err(error),
            None => Err(GatewayError::invalid_response(
                "mock script exhausted: no more scripted results",
            )),
        }
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockGateway::new();
        mock.push_text("first");
        mock.push_error(GatewayError::Overloaded);
        mock.push_text("second");

        let req = || ApiRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };

        assert_eq!(mock.send(req()).await.unwrap().text(), "first");
        assert!(matches!(
            mock.send(req()).await.unwrap_err(),
            GatewayError::Overloaded
        ));
        assert_eq!(mock.send(req()).await.unwrap().text(), "second");
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let mock = MockGateway::new();
        let err = mock
            .send(ApiRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
