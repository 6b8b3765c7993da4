//! # RepoLens Core
//!
//! Domain types, collaborator traits and error definitions for the RepoLens
//! context retrieval and agentic action engine. Every other crate in the
//! workspace depends inward on this one.
//!
//! The engine is assembled from explicit collaborators passed at construction
//! time:
//! - [`Provider`] for chat completion and raw embeddings
//! - [`Embedder`] for single-text embedding with the engine's retry policy
//! - [`ContextRetriever`] for the agent's `search_codebase` tool
//! - [`ActionExecutor`] for edits and test runs

pub mod action;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod structured;
pub mod workspace;

pub use action::{
    Action, ActionExecutor, ActionKind, ExecutionReport, ExecutionRequest, ExecutionStatus,
};
pub use chunk::{Chunk, ConstructKind};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolChoice, ToolDefinition,
};
pub use retrieval::{
    ContextMetadata, ContextRetriever, RetrievedContext, RetrievedSnippet, SearchFilters,
};
pub use structured::parse_structured;
pub use workspace::WorkspaceId;
