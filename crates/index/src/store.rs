//! The storage seam under the vector index.

use async_trait::async_trait;
use repolens_core::error::IndexError;
use repolens_core::{Chunk, ContextMetadata, RetrievedContext, SearchFilters, WorkspaceId};

/// A chunk together with the vector computed from its `embedding_text`.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Nearest-neighbour storage, one logical collection per workspace.
///
/// Every method takes a [`WorkspaceId`], and implementations key all reads and
/// writes by its collection name. Implementations must tolerate concurrent
/// callers; the index adds no locking of its own.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or replace by chunk id.
    async fn upsert(
        &self,
        workspace: &WorkspaceId,
        records: Vec<EmbeddedChunk>,
    ) -> Result<(), IndexError>;

    /// The `top_k` most similar chunks passing `filters`, best first.
    ///
    /// Filters are applied before selection.
    async fn query(
        &self,
        workspace: &WorkspaceId,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedContext>, IndexError>;

    async fn count(&self, workspace: &WorkspaceId) -> Result<usize, IndexError>;

    /// Ids currently stored for one file.
    async fn ids_for_file(
        &self,
        workspace: &WorkspaceId,
        file_path: &str,
    ) -> Result<Vec<String>, IndexError>;

    /// Delete by id, returning how many rows existed.
    async fn delete(&self, workspace: &WorkspaceId, ids: &[String]) -> Result<usize, IndexError>;
}

/// Build a context from a stored chunk and its similarity.
pub(crate) fn to_context(chunk: &Chunk, similarity: f32) -> RetrievedContext {
    RetrievedContext {
        id: chunk.id.clone(),
        content: chunk.content.clone(),
        metadata: ContextMetadata {
            file_path: chunk.file_path.clone(),
            line_start: chunk.line_start,
            line_end: chunk.line_end,
            construct_kind: chunk.construct_kind,
            name: chunk.name.clone(),
            language: chunk.language.clone(),
        },
        similarity_score: similarity,
        boosted_score: similarity,
    }
}

pub(crate) fn passes_filters(chunk: &Chunk, filters: &SearchFilters) -> bool {
    filters
        .language
        .as_ref()
        .is_none_or(|lang| &chunk.language == lang)
        && filters
            .file_path_contains
            .as_ref()
            .is_none_or(|needle| chunk.file_path.contains(needle.as_str()))
}
