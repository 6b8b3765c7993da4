//! In-memory store, for tests and ephemeral sessions.

use crate::store::{EmbeddedChunk, VectorStore, passes_filters, to_context};
use crate::vector::{similarity_score, top_k};
use async_trait::async_trait;
use repolens_core::error::IndexError;
use repolens_core::{RetrievedContext, SearchFilters, WorkspaceId};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Collection = BTreeMap<String, EmbeddedChunk>;

/// Collections keyed by name, chunks keyed (and iterated) by id.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(
        &self,
        workspace: &WorkspaceId,
        records: Vec<EmbeddedChunk>,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(workspace.collection_name()).or_default();
        for record in records {
            collection.insert(record.chunk.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        workspace: &WorkspaceId,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&workspace.collection_name()) else {
            return Ok(Vec::new());
        };

        let scored = collection
            .values()
            .filter(|r| passes_filters(&r.chunk, filters))
            .map(|r| (similarity_score(&r.embedding, vector), r))
            .collect();

        Ok(top_k(scored, k)
            .into_iter()
            .map(|(score, r)| to_context(&r.chunk, score))
            .collect())
    }

    async fn count(&self, workspace: &WorkspaceId) -> Result<usize, IndexError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&workspace.collection_name())
            .map_or(0, |c| c.len()))
    }

    async fn ids_for_file(
        &self,
        workspace: &WorkspaceId,
        file_path: &str,
    ) -> Result<Vec<String>, IndexError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&workspace.collection_name())
            .map(|c| {
                c.values()
                    .filter(|r| r.chunk.file_path == file_path)
                    .map(|r| r.chunk.id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, workspace: &WorkspaceId, ids: &[String]) -> Result<usize, IndexError> {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(&workspace.collection_name()) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| collection.remove(*id).is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_core::Chunk;

    fn record(path: &str, content: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk::window(path, content.into(), 1, 1, "py"),
            embedding,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryStore::new();
        let ws = WorkspaceId::new("w").unwrap();
        store.upsert(&ws, vec![record("a.py", "x", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&ws, vec![record("a.py", "x", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count(&ws).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_workspace_is_empty() {
        let store = InMemoryStore::new();
        let ws = WorkspaceId::new("never-used").unwrap();
        let hits = store
            .query(&ws, &[1.0], 5, &SearchFilters::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.count(&ws).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_reports_removed_rows() {
        let store = InMemoryStore::new();
        let ws = WorkspaceId::new("w").unwrap();
        let r = record("a.py", "x", vec![1.0]);
        let id = r.chunk.id.clone();
        store.upsert(&ws, vec![r]).await.unwrap();
        let removed = store.delete(&ws, &[id.clone(), "missing".into()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.ids_for_file(&ws, "a.py").await.unwrap().is_empty());
    }
}
