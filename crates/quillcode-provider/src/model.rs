//! Model information and pricing.

use serde::{Deserialize, Serialize};

/// Information about a language model.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelInfo {
    /// Model ID (e.g., "claude-sonnet-4-20250514").
    pub id: String,
    /// Provider ID (e.g., "anthropic").
    pub provider_id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether the model supports image input.
    #[serde(default)]
    pub supports_images: bool,
    /// Pricing information.
    pub cost: ModelCost,
    /// Token limits.
    pub limit: ModelLimit,
}

impl ModelInfo {
    /// Create a new model info with defaults.
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            name: String::new(),
            supports_images: false,
            cost: ModelCost::default(),
            limit: ModelLimit::default(),
        }
    }

    /// Set the model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the model cost.
    pub fn with_cost(mut self, cost: ModelCost) -> Self {
        self.cost = cost;
        self
    }

    /// Set the model limits.
    pub fn with_limit(mut self, limit: ModelLimit) -> Self {
        self.limit = limit;
        self
    }
}

/// Model pricing (per million tokens).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCost {
    /// Input token cost (per million).
    pub input: f64,
    /// Output token cost (per million).
    pub output: f64,
    /// Cache read cost (per million).
    #[serde(default)]
    pub cache_read: f64,
    /// Cache write cost (per million).
    #[serde(default)]
    pub cache_write: f64,
}

impl ModelCost {
    /// Calculate the cost for a given usage.
    pub fn calculate(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output;
        input_cost + output_cost
    }

    /// Calculate cost including cache tokens.
    ///
    /// Cache rates left at zero contribute nothing, so models without prompt
    /// caching price identically through both methods.
    pub fn calculate_with_cache(
        &self,
        input_tokens: u32,
        output_tokens: u32,
        cache_read: u32,
        cache_write: u32,
    ) -> f64 {
        self.calculate(input_tokens, output_tokens)
            + (cache_read as f64 / 1_000_000.0) * self.cache_read
            + (cache_write as f64 / 1_000_000.0) * self.cache_write
    }
}

/// Model token limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelLimit {
    /// Maximum context length (input + output).
    pub context: u32,
    /// Maximum output tokens.
    pub output: u32,
}

/// Built-in model definitions for Anthropic.
pub mod anthropic {
    use super::*;

    /// Claude Sonnet 4.5 - default model for agentic coding.
    pub fn claude_sonnet_4_5() -> ModelInfo {
        ModelInfo {
            id: "claude-sonnet-4-5-20250929".to_string(),
            provider_id: "anthropic".to_string(),
            name: "Claude Sonnet 4.5".to_string(),
            supports_images: true,
            cost: ModelCost {
                input: 3.0,
                output: 15.0,
                cache_read: 0.3,
                cache_write: 3.75,
            },
            limit: ModelLimit {
                context: 200_000,
                output: 64_000,
            },
        }
    }

    /// Claude Haiku 4.5 - fast and economical.
    pub fn claude_haiku_4_5() -> ModelInfo {
        ModelInfo {
            id: "claude-haiku-4-5-20251001".to_string(),
            provider_id: "anthropic".to_string(),
            name: "Claude Haiku 4.5".to_string(),
            supports_images: true,
            cost: ModelCost {
                input: 1.0,
                output: 5.0,
                cache_read: 0.1,
                cache_write: 1.25,
            },
            limit: ModelLimit {
                context: 200_000,
                output: 64_000,
            },
        }
    }

    /// Claude Opus 4.5 - maximum capability.
    pub fn claude_opus_4_5() -> ModelInfo {
        ModelInfo {
            id: "claude-opus-4-5-20251101".to_string(),
            provider_id: "anthropic".to_string(),
            name: "Claude Opus 4.5".to_string(),
            supports_images: true,
            cost: ModelCost {
                input: 5.0,
                output: 25.0,
                cache_read: 0.5,
                cache_write: 6.25,
            },
            limit: ModelLimit {
                context: 200_000,
                output: 64_000,
            },
        }
    }
}
