use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RetryPolicy, SearchHit, WebSearch};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const SERVICE: &str = "tavily";

/// Client for the Tavily search API
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_inner(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(query, max_results, "Searching Tavily");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                warn!("Rate limited by Tavily");
                return Err(ProviderError::RateLimited {
                    service: SERVICE,
                    retry_after: None,
                });
            }
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(SERVICE, error_text, Some(status.as_u16())));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.retry
            .run("tavily_search", || self.search_inner(query, max_results))
            .await
    }
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
