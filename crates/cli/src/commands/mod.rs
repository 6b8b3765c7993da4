pub mod agent;
pub mod analyze;
pub mod ingest;
pub mod init;
pub mod search;
pub mod serve;

use anyhow::Context;
use repolens_config::AppConfig;
use repolens_core::WorkspaceId;
use repolens_gateway::Engine;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Load and validate the config from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    }
    .context("Failed to load config")?;
    Ok(config)
}

pub async fn build_engine(config: AppConfig) -> anyhow::Result<Engine> {
    if !config.has_api_key() && config.provider.name != "ollama" {
        anyhow::bail!(
            "No API key configured for provider '{}'.\n  \
             Set REPOLENS_API_KEY (or SAMBANOVA_API_KEY / OPENAI_API_KEY),\n  \
             or add provider.api_key to {}",
            config.provider.name,
            AppConfig::config_dir().join("config.toml").display()
        );
    }
    Engine::from_config(config)
        .await
        .context("Failed to initialise the engine")
}

pub fn workspace(id: &str) -> anyhow::Result<WorkspaceId> {
    WorkspaceId::new(id).with_context(|| format!("Invalid workspace id '{id}'"))
}

/// A token cancelled by the first Ctrl-C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling...");
            trigger.cancel();
        }
    });
    token
}

/// The first `max_lines` lines of `text`, each indented.
pub fn preview(text: &str, max_lines: usize) -> String {
    let mut out: Vec<String> = text
        .lines()
        .take(max_lines)
        .map(|l| format!("      {l}"))
        .collect();
    if text.lines().count() > max_lines {
        out.push("      ...".into());
    }
    out.join("\n")
}
