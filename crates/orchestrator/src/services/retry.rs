use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::ProviderError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

/// Exponential backoff applied to rate limits and 5xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            max_backoff_ms: MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.initial_backoff_ms = backoff_ms;
        self
    }

    pub(crate) async fn run<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retries = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    if retries >= self.max_retries {
                        error!(
                            "{} failed after {} retries: {}",
                            operation_name, retries, e
                        );
                        return Err(e);
                    }

                    let wait_ms = match &e {
                        ProviderError::RateLimited {
                            retry_after: Some(secs),
                            ..
                        } => secs.saturating_mul(1000),
                        _ => backoff_ms,
                    }
                    .min(self.max_backoff_ms);

                    warn!(
                        "{} failed ({}), retrying in {}ms (attempt {}/{})",
                        operation_name,
                        e,
                        wait_ms,
                        retries + 1,
                        self.max_retries
                    );

                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    retries += 1;
                    backoff_ms = (backoff_ms * 2).min(self.max_backoff_ms);
                }
                Err(e) => {
                    if retries > 0 {
                        info!("{} failed after {} retries: {}", operation_name, retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
