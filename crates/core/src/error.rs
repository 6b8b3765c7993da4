//! Error types for the RepoLens domain.
//!
//! Each bounded context has its own `thiserror` enum; [`Error`] wraps them
//! for callers that cross context boundaries.

use thiserror::Error;

/// The top-level error type for RepoLens operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty response: {0}")]
    EmptyResponse(String),
}

impl ProviderError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::StreamInterrupted(_)
            | Self::EmptyResponse(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::BadRequest(_)
            | Self::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(#[from] ProviderError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid workspace id '{0}'")]
    InvalidWorkspace(String),
}

/// A per-file ingestion failure. Never aborts a repository walk.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Failed to read {file_path}: {reason}")]
    Read { file_path: String, reason: String },

    #[error("Failed to parse {file_path}: {reason}")]
    Parse { file_path: String, reason: String },

    #[error("Walk error at {file_path}: {reason}")]
    Walk { file_path: String, reason: String },

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl IngestError {
    /// The file the error record refers to.
    pub fn file_path(&self) -> &str {
        match self {
            Self::Read { file_path, .. }
            | Self::Parse { file_path, .. }
            | Self::Walk { file_path, .. } => file_path,
            Self::InvalidPattern { pattern, .. } => pattern,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model call failed during iteration {iteration}: {source}")]
    Reasoning {
        iteration: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("Analysis stream failed: {0}")]
    Analysis(#[source] ProviderError),
}

/// A model response that could not be read as the expected structure.
#[derive(Debug, Clone, Error)]
pub enum StructuredOutputError {
    #[error("Model returned no structured content")]
    Empty,

    #[error("Malformed structured output: {reason}")]
    Malformed { reason: String, raw: String },
}
