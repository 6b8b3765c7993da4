//! Test doubles shared by this crate's unit tests.

use async_trait::async_trait;
use repolens_core::error::ProviderError;
use repolens_core::provider::ProviderResponse;
use repolens_core::{Embedder, Message, Provider, ProviderRequest};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embeds text by counting vocabulary words, plus one constant dimension so
/// no vector is zero. Exact overrides pin the vector for a given text.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    overrides: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            overrides: HashMap::new(),
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    pub fn with_override(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.to_string(), vector);
        self
    }

    /// Fail any text containing `needle`.
    pub fn failing_on(mut self, needle: &'static str) -> Self {
        self.fail_on = Some(needle);
        self
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = self.fail_on
            && text.contains(needle)
        {
            return Err(ProviderError::Network("connection reset".into()));
        }
        if let Some(v) = self.overrides.get(text) {
            return Ok(v.clone());
        }
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|w| lower.matches(w).count() as f32)
            .collect();
        v.push(0.1);
        Ok(v)
    }
}

/// Replies with canned texts in order, then repeats the last one.
pub struct ScriptedProvider {
    replies: Vec<Result<String, ProviderError>>,
    index: AtomicUsize,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies[i.min(self.replies.len() - 1)].clone();
        reply.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "scripted".into(),
        })
    }
}
