//! Provider-backed embedder with truncation, timeout and bounded retry.

use async_trait::async_trait;
use repolens_config::EmbeddingConfig;
use repolens_core::error::ProviderError;
use repolens_core::provider::EmbeddingRequest;
use repolens_core::{Embedder, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    max_chars: usize,
    max_attempts: u32,
    timeout: Duration,
    backoff_min: Duration,
    backoff_max: Duration,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::from_config(provider, model, &EmbeddingConfig::default())
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_chars: config.max_chars,
            max_attempts: config.max_attempts.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            backoff_min: Duration::from_millis(config.backoff_min_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): doubling from the
    /// minimum, capped at the maximum.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_min.saturating_mul(factor).min(self.backoff_max)
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            inputs: vec![text.to_string()],
        };
        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("embedding exceeded {}s", self.timeout.as_secs()))
            })??;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse("no embedding returned".into()))
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let text = truncate_for_embedding(text, self.max_chars);
        let mut attempt = 1;
        loop {
            match self.embed_once(&text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Embedding failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Embedding failed");
                    return Err(e);
                }
            }
        }
    }
}
