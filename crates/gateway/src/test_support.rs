//! In-memory engine wiring for route tests.

use crate::api_v1::{ApiV1State, SharedApiState};
use crate::engine::Engine;
use async_trait::async_trait;
use repolens_config::AppConfig;
use repolens_core::error::ProviderError;
use repolens_core::provider::ProviderResponse;
use repolens_core::{Embedder, Message, Provider, ProviderRequest};
use repolens_index::InMemoryStore;
use std::sync::Arc;

/// Answers every request with the same text and no tool calls.
pub struct FixedReplyProvider {
    pub reply: String,
}

#[async_trait]
impl Provider for FixedReplyProvider {
    fn name(&self) -> &str {
        "fixed_reply"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(&self.reply),
            usage: None,
            model: "mock-model".into(),
        })
    }
}

/// Counts occurrences of a few words, plus a constant dimension.
pub struct WordCountEmbedder;

#[async_trait]
impl Embedder for WordCountEmbedder {
    fn name(&self) -> &str {
        "word_count"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = ["login", "connect", "cache"]
            .iter()
            .map(|w| lower.matches(w).count() as f32)
            .collect();
        v.push(0.1);
        Ok(v)
    }
}

pub fn test_engine(reply: &str) -> Arc<Engine> {
    Arc::new(
        Engine::assemble(
            AppConfig::default(),
            Arc::new(FixedReplyProvider {
                reply: reply.to_string(),
            }),
            Arc::new(InMemoryStore::new()),
            Arc::new(WordCountEmbedder),
        )
        .unwrap(),
    )
}

pub fn test_state(reply: &str) -> SharedApiState {
    Arc::new(ApiV1State::new(test_engine(reply)))
}
