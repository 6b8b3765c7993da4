//! Builds the configured backend and its embedder.

use crate::embedder::ProviderEmbedder;
use crate::openai_compat::OpenAiCompatProvider;
use crate::throttle::ThrottledProvider;
use repolens_config::AppConfig;
use repolens_core::error::ProviderError;
use repolens_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the configured provider, throttled to `max_in_flight`.
///
/// Every backend except a local Ollama needs an API key.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let pc = &config.provider;
    let api_key = match (&pc.api_key, pc.name.as_str()) {
        (Some(key), _) if !key.trim().is_empty() => key.clone(),
        (_, "ollama") => "ollama".to_string(),
        _ => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'; set REPOLENS_API_KEY or provider.api_key",
                pc.name
            )));
        }
    };
    let base_url = pc
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&pc.name));

    let http = OpenAiCompatProvider::with_timeout(
        &pc.name,
        &base_url,
        api_key,
        Duration::from_secs(pc.request_timeout_secs),
    )?;
    let throttled = ThrottledProvider::new(Arc::new(http), pc.max_in_flight);

    info!(
        provider = %pc.name,
        base_url = %base_url,
        max_in_flight = pc.max_in_flight,
        "Provider configured"
    );
    Ok(Arc::new(throttled))
}

/// The embedder for the configured embedding model, sharing `provider`'s
/// throttle.
pub fn build_embedder(config: &AppConfig, provider: Arc<dyn Provider>) -> ProviderEmbedder {
    ProviderEmbedder::from_config(provider, &config.provider.embedding_model, &config.embedding)
}

fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "sambanova" => "https://api.sambanova.ai/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        other => format!("https://{other}.api.example.com/v1"),
    }
}
