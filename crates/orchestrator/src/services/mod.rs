//! External collaborators: text generation and web search.

mod gemini;
mod retry;
mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use gemini::{GeminiClient, DEFAULT_GEMINI_MODEL};
pub use retry::RetryPolicy;
pub use tavily::TavilyClient;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// One prompt-to-text request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Generation {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name shown in status output.
    fn name(&self) -> &str;

    async fn generate(&self, request: Generation) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}
