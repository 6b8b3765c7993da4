//! Retrieval results and the context retriever collaborator.

use crate::chunk::ConstructKind;
use crate::error::IndexError;
use crate::workspace::WorkspaceId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Source location and structure of a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
    pub construct_kind: ConstructKind,
    #[serde(default)]
    pub name: String,
    pub language: String,
}

/// A chunk returned for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub id: String,
    pub content: String,
    pub metadata: ContextMetadata,
    /// `1 - cosine_distance`, clamped to `[0, 1]`
    pub similarity_score: f32,
    /// Similarity after structural-locality boosting
    pub boosted_score: f32,
}

/// Server-side filters applied before top-k selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Exact match on the chunk language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Substring match on the chunk file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path_contains: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.file_path_contains.is_none()
    }
}

/// The reduced shape the agent loop consumes from a retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub file_path: String,
    pub content: String,
    pub metadata: ContextMetadata,
}

impl From<RetrievedContext> for RetrievedSnippet {
    fn from(ctx: RetrievedContext) -> Self {
        Self {
            file_path: ctx.metadata.file_path.clone(),
            content: ctx.content,
            metadata: ctx.metadata,
        }
    }
}

/// Codebase search as seen by the agent loop.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn search(
        &self,
        workspace: &WorkspaceId,
        query: &str,
    ) -> std::result::Result<Vec<RetrievedSnippet>, IndexError>;
}
