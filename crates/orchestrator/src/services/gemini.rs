use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Generation, RetryPolicy, TextGenerator};
use crate::error::ProviderError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const SERVICE: &str = "gemini";

/// Client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_inner(&self, request: &Generation) -> Result<String, ProviderError> {
        debug!(
            model = %self.model,
            prompt_len = request.prompt.len(),
            temperature = request.temperature,
            "Requesting Gemini completion"
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                warn!("Rate limited by Gemini");
                return Err(ProviderError::RateLimited {
                    service: SERVICE,
                    retry_after: None,
                });
            }

            let message = match serde_json::from_str::<GeminiErrorBody>(&error_text) {
                Ok(body) => {
                    warn!(
                        "Gemini API error: {} (status: {:?})",
                        body.error.message, body.error.status
                    );
                    body.error.message
                }
                Err(_) => error_text,
            };
            return Err(ProviderError::api(SERVICE, message, Some(status.as_u16())));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(SERVICE));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn generate(&self, request: Generation) -> Result<String, ProviderError> {
        self.retry
            .run("gemini_generate", || self.generate_inner(&request))
            .await
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
