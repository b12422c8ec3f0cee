//! Streaming response types and aggregation.

use crate::message::ContentBlock;
use serde::{Deserialize, Serialize};

/// A chunk from a streaming model response.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Text content delta.
    TextDelta(String),

    /// A tool call completed.
    ToolCall {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
        /// Complete arguments JSON.
        arguments: String,
    },

    /// The response is finishing.
    Finish {
        /// Token usage for the response.
        usage: Usage,
        /// Reason for finishing.
        finish_reason: FinishReason,
    },
}

impl StreamChunk {
    /// Create a text delta chunk.
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta(delta.into())
    }

    /// Create a completed tool call chunk.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens used.
    pub input_tokens: u32,
    /// Output tokens generated.
    pub output_tokens: u32,
    /// Tokens from cache read.
    #[serde(default)]
    pub cache_read_tokens: u32,
    /// Tokens written to cache.
    #[serde(default)]
    pub cache_write_tokens: u32,
}

impl Usage {
    /// Create a new usage with input and output tokens.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Total tokens (input + output).
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Merge with another usage (adding all counts).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

/// Reason for finishing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal completion (end of turn).
    #[default]
    EndTurn,
    /// Stopped due to max tokens.
    MaxTokens,
    /// Stopped for tool use.
    ToolUse,
    /// Unknown or other reason.
    Other,
}

impl FinishReason {
    /// Parse from the wire stop_reason string.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "tool_use" => Self::ToolUse,
            _ => Self::Other,
        }
    }
}

/// A complete model response.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    /// Assistant content blocks (text and tool_use).
    pub content: Vec<ContentBlock>,
    /// Token usage.
    pub usage: Usage,
    /// Finish reason.
    pub finish_reason: FinishReason,
}

impl ApiResponse {
    /// Concatenated text of the response.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Folds stream chunks into a complete [`ApiResponse`].
///
/// A cancelled stream leaves the aggregator holding whatever was delivered;
/// `finish()` then reports the partial content without a finish reason
/// upgrade.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    text: String,
    content: Vec<ContentBlock>,
    usage: Usage,
    finish_reason: FinishReason,
}

impl ResponseAggregator {
    /// Create a new empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk into the response.
    pub fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::TextDelta(delta) => {
                self.text.push_str(&delta);
            }
            StreamChunk::ToolCall {
                id,
                name,
                arguments,
            } => {
                self.flush_text();
                let input = serde_json::from_str(&arguments)
                    .unwrap_or(serde_json::Value::String(arguments));
                self.content.push(ContentBlock::tool_use(id, name, input));
            }
            StreamChunk::Finish {
                usage,
                finish_reason,
            } => {
                self.usage.merge(&usage);
                self.finish_reason = finish_reason;
            }
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.content
                .push(ContentBlock::text(std::mem::take(&mut self.text)));
        }
    }

    /// Finish aggregation and return the response.
    pub fn finish(mut self) -> ApiResponse {
        self.flush_text();
        ApiResponse {
            content: self.content,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_merge() {
        let mut usage1 = Usage::new(100, 50);
        let usage2 = Usage::new(200, 100);

        usage1.merge(&usage2);

        assert_eq!(usage1.input_tokens, 300);
        assert_eq!(usage1.output_tokens, 150);
        assert_eq!(usage1.total(), 450);
    }

    #[test]
    fn test_finish_reason_parsing() {
        assert_eq!(FinishReason::parse("end_turn"), FinishReason::EndTurn);
        assert_eq!(FinishReason::parse("tool_use"), FinishReason::ToolUse);
        assert_eq!(FinishReason::parse("max_tokens"), FinishReason::MaxTokens);
        assert_eq!(FinishReason::parse("weird"), FinishReason::Other);
    }

    #[test]
    fn test_aggregator_text_then_tool() {
        let mut agg = ResponseAggregator::new();
        agg.push(StreamChunk::text("I'll read "));
        agg.push(StreamChunk::text("the file."));
        agg.push(StreamChunk::tool_call(
            "cal_1",
            "read_file",
            r#"{"path":"src/main.rs"}"#,
        ));
        agg.push(StreamChunk::Finish {
            usage: Usage::new(10, 20),
            finish_reason: FinishReason::ToolUse,
        });

        let response = agg.finish();
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.text(), "I'll read the file.");
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
        match &response.content[1] {
            ContentBlock::ToolUse { name, input, .. } => {
                assert_eq!(name, "read_file");
                assert_eq!(input["path"], "src/main.rs");
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregator_partial_without_finish() {
        let mut agg = ResponseAggregator::new();
        agg.push(StreamChunk::text("partial"));

        let response = agg.finish();
        assert_eq!(response.text(), "partial");
        assert_eq!(response.finish_reason, FinishReason::EndTurn);
        assert_eq!(response.usage.total(), 0);
    }
}
