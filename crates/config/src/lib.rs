//! Configuration loading, validation, and management for RepoLens.
//!
//! Loads configuration from `~/.repolens/config.toml` (or `$REPOLENS_HOME`)
//! with environment variable overrides. Every field has a default, so an
//! empty or missing file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Chat and embedding backend settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend name understood by the provider router
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the router's base URL for `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Simultaneous outbound calls across chat and embeddings
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "sambanova".into()
}
fn default_chat_model() -> String {
    "Meta-Llama-3.1-8B-Instruct".into()
}
fn default_embedding_model() -> String {
    "E5-Mistral-7B-Instruct".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_in_flight() -> usize {
    10
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            base_url: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_in_flight: default_max_in_flight(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

/// Repository walk and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// File extensions (without the dot) eligible for ingestion
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_window_lines")]
    pub window_lines: usize,

    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,

    /// Constructs longer than this are split into line windows
    #[serde(default = "default_max_construct_chars")]
    pub max_construct_chars: usize,

    #[serde(default = "default_construct_window_lines")]
    pub construct_window_lines: usize,

    /// Chunks buffered before each index upsert
    #[serde(default = "default_flush_size")]
    pub flush_size: usize,
}

fn default_extensions() -> Vec<String> {
    [
        "py", "js", "ts", "jsx", "tsx", "java", "go", "rs", "cpp", "c", "h", "rb", "php",
        "swift", "kt", "scala", "r", "m", "cs", "json", "yaml", "md",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_ignore_patterns() -> Vec<String> {
    [
        "node_modules", ".git", "__pycache__", ".venv", "dist", "build", "*.min.js", "*.pyc",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_max_file_size() -> u64 {
    1024 * 1024
}
fn default_window_lines() -> usize {
    50
}
fn default_window_overlap() -> usize {
    5
}
fn default_max_construct_chars() -> usize {
    10_000
}
fn default_construct_window_lines() -> usize {
    100
}
fn default_flush_size() -> usize {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
            window_lines: default_window_lines(),
            window_overlap: default_window_overlap(),
            max_construct_chars: default_max_construct_chars(),
            construct_window_lines: default_construct_window_lines(),
            flush_size: default_flush_size(),
        }
    }
}

/// Embedding truncation and retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Chunks embedded concurrently per upsert batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Prefix applied to search queries before embedding
    #[serde(default = "default_query_instruction")]
    pub query_instruction: String,
}

fn default_max_chars() -> usize {
    12_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_min_ms() -> u64 {
    2_000
}
fn default_backoff_max_ms() -> u64 {
    10_000
}
fn default_batch_size() -> usize {
    32
}
fn default_query_instruction() -> String {
    "Given a code query, retrieve relevant code snippets: ".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_request_timeout_secs(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            batch_size: default_batch_size(),
            query_instruction: default_query_instruction(),
        }
    }
}

/// On-disk vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// SQLite database file
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// "prune" deletes a file's stale chunk ids after re-ingestion, "retain" keeps them
    #[serde(default = "default_orphan_policy")]
    pub orphan_policy: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./.repolens/index.db")
}
fn default_orphan_policy() -> String {
    "prune".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            orphan_policy: default_orphan_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_true")]
    pub rerank: bool,

    /// LLM re-rank runs only when more candidates than this are retrieved
    #[serde(default = "default_rerank_threshold")]
    pub rerank_threshold: usize,
}

fn default_top_k() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_rerank_threshold() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            rerank: true,
            rerank_threshold: default_rerank_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Executables `run_tests` may launch
    #[serde(default = "default_test_commands")]
    pub allowed_test_commands: Vec<String>,

    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// When false, edits are recorded as proposals and never written
    #[serde(default)]
    pub apply_edits: bool,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_test_commands() -> Vec<String> {
    ["pytest", "python", "cargo", "npm", "go", "make"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_test_timeout_secs() -> u64 {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            allowed_test_commands: default_test_commands(),
            test_timeout_secs: default_test_timeout_secs(),
            apply_edits: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Static shared secret expected in `X-API-Key`; unset disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path, then apply environment
    /// overrides:
    /// - `REPOLENS_API_KEY`, `SAMBANOVA_API_KEY`, `OPENAI_API_KEY` (first set wins,
    ///   only when the file has no key)
    /// - `REPOLENS_BASE_URL`, `REPOLENS_CHAT_MODEL`, `REPOLENS_EMBEDDING_MODEL`
    /// - `REPOLENS_GATEWAY_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("REPOLENS_API_KEY")
                .or_else(|| lookup("SAMBANOVA_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("REPOLENS_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if let Some(model) = lookup("REPOLENS_CHAT_MODEL") {
            self.provider.chat_model = model;
        }
        if let Some(model) = lookup("REPOLENS_EMBEDDING_MODEL") {
            self.provider.embedding_model = model;
        }
        if let Some(key) = lookup("REPOLENS_GATEWAY_KEY") {
            self.gateway.api_key = Some(key);
        }
    }

    /// The configuration directory (`$REPOLENS_HOME` or `~/.repolens`).
    pub fn config_dir() -> PathBuf {
        std::env::var("REPOLENS_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_home().join(".repolens"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return fail("provider.temperature must be between 0.0 and 2.0");
        }
        if self.provider.max_in_flight == 0 {
            return fail("provider.max_in_flight must be at least 1");
        }
        if self.ingest.window_lines == 0 || self.ingest.construct_window_lines == 0 {
            return fail("ingest window sizes must be at least 1 line");
        }
        if self.ingest.window_overlap >= self.ingest.window_lines
            || self.ingest.window_overlap >= self.ingest.construct_window_lines
        {
            return fail("ingest.window_overlap must be smaller than every window size");
        }
        if self.ingest.flush_size == 0 || self.embedding.batch_size == 0 {
            return fail("ingest.flush_size and embedding.batch_size must be at least 1");
        }
        if self.embedding.max_attempts == 0 {
            return fail("embedding.max_attempts must be at least 1");
        }
        if self.embedding.backoff_min_ms > self.embedding.backoff_max_ms {
            return fail("embedding.backoff_min_ms must not exceed backoff_max_ms");
        }
        if self.agent.max_iterations == 0 {
            return fail("agent.max_iterations must be at least 1");
        }
        if !matches!(self.index.orphan_policy.as_str(), "prune" | "retain") {
            return fail("index.orphan_policy must be \"prune\" or \"retain\"");
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// A default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.provider.name, "sambanova");
        assert_eq!(config.provider.max_tokens, 4096);
        assert_eq!(config.ingest.window_lines, 50);
        assert_eq!(config.ingest.window_overlap, 5);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.agent.max_iterations, 5);
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.chat_model, "Meta-Llama-3.1-8B-Instruct");
        assert_eq!(parsed.ingest.extensions.len(), 22);
        assert_eq!(parsed.gateway.port, 8000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[ingest]
window_lines = 80

[agent]
max_iterations = 8
"#,
        )
        .unwrap();
        assert_eq!(config.ingest.window_lines, 80);
        assert_eq!(config.ingest.window_overlap, 5);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.retrieval.rerank_threshold, 5);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ingest.window_overlap = 50;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.index.orphan_policy = "sometimes".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "sambanova");
    }

    #[test]
    fn load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nrerank = false\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.retrieval.rerank);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ingest\nwindow_lines = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("SAMBANOVA_API_KEY", "sn-key"),
            ("OPENAI_API_KEY", "oa-key"),
            ("REPOLENS_CHAT_MODEL", "Meta-Llama-3.3-70B-Instruct"),
            ("REPOLENS_GATEWAY_KEY", "shared"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.provider.api_key.as_deref(), Some("sn-key"));
        assert_eq!(config.provider.chat_model, "Meta-Llama-3.3-70B-Instruct");
        assert_eq!(config.gateway.api_key.as_deref(), Some("shared"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("from-file".into());
        config.apply_env(|k| (k == "REPOLENS_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        config.gateway.api_key = Some("gw-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("gw-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
