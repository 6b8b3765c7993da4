//! The vector index: batched embedding over a [`VectorStore`].

use crate::store::{EmbeddedChunk, VectorStore};
use futures::future::join_all;
use repolens_core::error::IndexError;
use repolens_core::{Chunk, Embedder, RetrievedContext, SearchFilters, WorkspaceId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_BATCH_SIZE: usize = 32;

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Chunks embedded concurrently per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and store `chunks`, replacing any rows with the same id.
    ///
    /// Each batch fans out one embedding call per chunk and joins them;
    /// vectors are matched back to chunks by position. A failed embedding
    /// fails the whole call, leaving earlier batches stored.
    pub async fn upsert(&self, workspace: &WorkspaceId, chunks: &[Chunk]) -> Result<usize, IndexError> {
        for batch in chunks.chunks(self.batch_size) {
            let vectors = join_all(batch.iter().map(|c| self.embedder.embed(&c.embedding_text)))
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;

            let records = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
                .collect();
            self.store.upsert(workspace, records).await?;
            debug!(workspace = %workspace, batch = batch.len(), "Embedded batch stored");
        }
        Ok(chunks.len())
    }

    /// Similarity query. `top_k` below 1 is treated as 1.
    pub async fn query(
        &self,
        workspace: &WorkspaceId,
        vector: &[f32],
        top_k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        let filters = filters.cloned().unwrap_or_default();
        self.store
            .query(workspace, vector, top_k.max(1), &filters)
            .await
    }

    pub async fn count(&self, workspace: &WorkspaceId) -> Result<usize, IndexError> {
        self.store.count(workspace).await
    }

    /// Delete rows for `file_path` whose ids are not in `keep`.
    pub async fn prune_file(
        &self,
        workspace: &WorkspaceId,
        file_path: &str,
        keep: &HashSet<String>,
    ) -> Result<usize, IndexError> {
        let stale: Vec<String> = self
            .store
            .ids_for_file(workspace, file_path)
            .await?
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.store.delete(workspace, &stale).await
    }
}
