//! Language-model gateway for quillcode.
//!
//! This crate isolates the engine from the provider wire protocol. The engine
//! hands a [`LanguageGateway`] a fully-prepared request (system prompt,
//! adjusted history, tool schemas, sampling parameters) and receives typed
//! content blocks and usage back; the HTTP shape of the exchange stays in
//! here.

pub mod error;
pub mod http;
pub mod message;
pub mod mock;
pub mod model;
pub mod stream;

pub use error::{GatewayError, GatewayResult};
pub use http::HttpGateway;
pub use message::{ContentBlock, ImageSource, Message, ResultContent, Role};
pub use mock::MockGateway;
pub use model::{ModelCost, ModelInfo, ModelLimit};
pub use stream::{ApiResponse, FinishReason, ResponseAggregator, StreamChunk, Usage};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

/// A fully-prepared model request.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// System prompt.
    pub system: Option<String>,
    /// Conversation history, already fitted to the context window.
    pub messages: Vec<Message>,
    /// Available tools.
    pub tools: Vec<ToolDefinition>,
    /// Temperature for sampling (0.0-1.0).
    pub temperature: Option<f32>,
    /// Top-p (nucleus) sampling.
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Cancellation token; aborts the request mid-flight.
    pub abort: Option<tokio_util::sync::CancellationToken>,
}

/// A tool definition for the model.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the tool parameters.
    pub parameters: Value,
}

/// The main trait for language-model gateways.
#[async_trait]
pub trait LanguageGateway: Send + Sync {
    /// Send a request and wait for the complete response.
    async fn send(&self, request: ApiRequest) -> GatewayResult<ApiResponse>;

    /// Send a request and receive the response as a stream of chunks.
    ///
    /// The default implementation performs a plain `send` and replays the
    /// aggregated response as chunks; gateways with streaming transports
    /// override it. Cancellation mid-stream ends the stream early; chunks
    /// already delivered remain valid.
    async fn send_streaming(
        &self,
        request: ApiRequest,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<StreamChunk>>> {
        let response = self.send(request).await?;
        let mut chunks: Vec<GatewayResult<StreamChunk>> = Vec::new();
        for block in response.content {
            match block {
                ContentBlock::Text { text } => chunks.push(Ok(StreamChunk::TextDelta(text))),
                ContentBlock::ToolUse { id, name, input } => {
                    chunks.push(Ok(StreamChunk::ToolCall {
                        id,
                        name,
                        arguments: input.to_string(),
                    }));
                }
                _ => {}
            }
        }
        chunks.push(Ok(StreamChunk::Finish {
            usage: response.usage,
            finish_reason: response.finish_reason,
        }));
        Ok(futures::stream::iter(chunks).boxed())
    }

    /// Get information about the model behind this gateway.
    fn model_info(&self) -> &ModelInfo;

    /// Get the provider ID (e.g., "anthropic").
    fn provider_id(&self) -> &str;
}

/// A boxed gateway for dynamic dispatch.
pub type BoxedGateway = Arc<dyn LanguageGateway>;
