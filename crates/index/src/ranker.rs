//! Hybrid ranking: vector similarity, structural-locality boosts and an
//! optional LLM re-rank.

use crate::index::VectorIndex;
use crate::rerank::{GENERAL_TASK, LlmReranker};
use async_trait::async_trait;
use repolens_core::error::IndexError;
use repolens_core::{
    ContextRetriever, RetrievedContext, RetrievedSnippet, SearchFilters, WorkspaceId,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const EXACT_FILE_BOOST: f32 = 1.5;
const SAME_DIRECTORY_BOOST: f32 = 1.2;
const SAME_EXTENSION_BOOST: f32 = 1.1;

const DEFAULT_QUERY_INSTRUCTION: &str = "Given a code query, retrieve relevant code snippets: ";
const DEFAULT_RETRIEVER_TOP_K: usize = 5;

/// The boost for one candidate given the target file.
///
/// Only the highest-priority matching rule applies: exact file, then same
/// directory, then same extension.
pub fn locality_boost(candidate: &str, target: &str) -> f32 {
    let candidate = normalize(candidate);
    let target = normalize(target);
    if candidate == target {
        return EXACT_FILE_BOOST;
    }

    let (c, t) = (Path::new(&candidate), Path::new(&target));
    if c.parent() == t.parent() {
        return SAME_DIRECTORY_BOOST;
    }
    match (c.extension(), t.extension()) {
        (Some(a), Some(b)) if a == b => SAME_EXTENSION_BOOST,
        _ => 1.0,
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

/// Boost every candidate against `target` and stable-sort by boosted score.
///
/// Candidates arrive in similarity order, so equal boosted scores keep it.
pub fn apply_location_boost(candidates: &mut [RetrievedContext], target: &str) {
    for c in candidates.iter_mut() {
        c.boosted_score = c.similarity_score * locality_boost(&c.metadata.file_path, target);
    }
    candidates.sort_by(|a, b| {
        b.boosted_score
            .partial_cmp(&a.boosted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub struct HybridRanker {
    index: Arc<VectorIndex>,
    query_instruction: String,
    reranker: Option<LlmReranker>,
    retriever_top_k: usize,
}

impl HybridRanker {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self {
            index,
            query_instruction: DEFAULT_QUERY_INSTRUCTION.into(),
            reranker: None,
            retriever_top_k: DEFAULT_RETRIEVER_TOP_K,
        }
    }

    pub fn with_query_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.query_instruction = instruction.into();
        self
    }

    pub fn with_reranker(mut self, reranker: LlmReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// How many results [`ContextRetriever::search`] returns.
    pub fn with_retriever_top_k(mut self, top_k: usize) -> Self {
        self.retriever_top_k = top_k.max(1);
        self
    }

    pub async fn rank(
        &self,
        workspace: &WorkspaceId,
        query: &str,
        location_hint: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        self.rank_filtered(workspace, query, location_hint, top_k, &SearchFilters::default())
            .await
    }

    pub async fn rank_filtered(
        &self,
        workspace: &WorkspaceId,
        query: &str,
        location_hint: Option<&str>,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        self.rank_inner(workspace, query, GENERAL_TASK, location_hint, top_k, filters)
            .await
    }

    /// Rank for a named task; the re-rank pass is told what the context is for.
    pub async fn rank_for_task(
        &self,
        workspace: &WorkspaceId,
        query: &str,
        task: &str,
        location_hint: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        self.rank_inner(
            workspace,
            query,
            task,
            location_hint,
            top_k,
            &SearchFilters::default(),
        )
        .await
    }

    async fn rank_inner(
        &self,
        workspace: &WorkspaceId,
        query: &str,
        task: &str,
        location_hint: Option<&str>,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        let top_k = top_k.max(1);
        let query_vector = self
            .index
            .embedder()
            .embed(&format!("{}{query}", self.query_instruction))
            .await?;

        let mut candidates = self
            .index
            .query(workspace, &query_vector, top_k * 2, Some(filters))
            .await?;

        if let Some(target) = location_hint.filter(|t| !t.trim().is_empty()) {
            apply_location_boost(&mut candidates, target);
        }

        if let Some(reranker) = &self.reranker
            && reranker.applies_to(candidates.len())
        {
            candidates = reranker.rerank(query, task, candidates).await;
        }

        candidates.truncate(top_k);
        debug!(
            workspace = %workspace,
            results = candidates.len(),
            hinted = location_hint.is_some(),
            "Ranked query"
        );
        Ok(candidates)
    }
}

#[async_trait]
impl ContextRetriever for HybridRanker {
    async fn search(
        &self,
        workspace: &WorkspaceId,
        query: &str,
    ) -> Result<Vec<RetrievedSnippet>, IndexError> {
        Ok(self
            .rank(workspace, query, None, self.retriever_top_k)
            .await?
            .into_iter()
            .map(RetrievedSnippet::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use crate::store::{EmbeddedChunk, VectorStore};
    use crate::test_support::{KeywordEmbedder, ScriptedProvider};
    use repolens_core::Chunk;

    const QUERY: &str = "where is login handled";

    /// A unit vector whose cosine with `[1, 0]` is exactly `similarity`.
    fn at(similarity: f32) -> Vec<f32> {
        vec![similarity, (1.0 - similarity * similarity).sqrt()]
    }

    async fn ranker_over(entries: &[(&str, f32)]) -> (HybridRanker, WorkspaceId) {
        let store = Arc::new(InMemoryStore::new());
        let ws = WorkspaceId::new("w").unwrap();
        let records = entries
            .iter()
            .map(|(path, sim)| EmbeddedChunk {
                chunk: Chunk::window(path, format!("code in {path}"), 1, 10, "py"),
                embedding: at(*sim),
            })
            .collect();
        store.upsert(&ws, records).await.unwrap();

        let embedder = KeywordEmbedder::new(&[])
            .with_override(&format!("{DEFAULT_QUERY_INSTRUCTION}{QUERY}"), vec![1.0, 0.0]);
        let index = Arc::new(VectorIndex::new(store, Arc::new(embedder)));
        (HybridRanker::new(index), ws)
    }

    fn paths(list: &[RetrievedContext]) -> Vec<&str> {
        list.iter().map(|c| c.metadata.file_path.as_str()).collect()
    }

    #[test]
    fn boost_rules_take_highest_priority_only() {
        assert_eq!(locality_boost("src/auth/login.py", "src/auth/login.py"), 1.5);
        assert_eq!(locality_boost("./src/auth/login.py", "src/auth/login.py"), 1.5);
        assert_eq!(locality_boost("src/auth/session.py", "src/auth/login.py"), 1.2);
        assert_eq!(locality_boost("src/db/models.py", "src/auth/login.py"), 1.1);
        assert_eq!(locality_boost("web/app.ts", "src/auth/login.py"), 1.0);
        assert_eq!(locality_boost("Makefile", "src/Dockerfile"), 1.0);
    }

    #[tokio::test]
    async fn no_hint_returns_similarity_order() {
        let (ranker, ws) =
            ranker_over(&[("a.py", 0.5), ("b.py", 0.9), ("c.py", 0.7), ("d.py", 0.1)]).await;
        let out = ranker.rank(&ws, QUERY, None, 2).await.unwrap();
        assert_eq!(paths(&out), vec!["b.py", "c.py"]);
        assert!((out[0].boosted_score - out[0].similarity_score).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn exact_file_boost_beats_higher_raw_scores() {
        let (ranker, ws) = ranker_over(&[
            ("src/auth/login.py", 0.7),
            ("src/auth/session.py", 0.8),
            ("docs/intro.md", 0.9),
        ])
        .await;
        let out = ranker
            .rank(&ws, QUERY, Some("src/auth/login.py"), 3)
            .await
            .unwrap();
        assert_eq!(
            paths(&out),
            vec!["src/auth/login.py", "src/auth/session.py", "docs/intro.md"]
        );
        assert!((out[0].boosted_score - 1.05).abs() < 1e-4);
        assert!((out[1].boosted_score - 0.96).abs() < 1e-4);
        assert!((out[0].similarity_score - 0.7).abs() < 1e-4);
    }

    #[test]
    fn equal_boosted_scores_keep_similarity_order() {
        // 0.5 * 1.5 == 0.75: the unrelated candidate was ahead on similarity.
        let out = {
            let mut list = vec![
                context("other/x.rs", 0.75),
                context("src/target.py", 0.5),
            ];
            apply_location_boost(&mut list, "src/target.py");
            list
        };
        assert_eq!(paths(&out), vec!["other/x.rs", "src/target.py"]);
    }

    #[tokio::test]
    async fn top_k_zero_behaves_as_one() {
        let (ranker, ws) = ranker_over(&[("a.py", 0.5), ("b.py", 0.9)]).await;
        let out = ranker.rank(&ws, QUERY, None, 0).await.unwrap();
        assert_eq!(paths(&out), vec!["b.py"]);
    }

    #[tokio::test]
    async fn rerank_garbage_degrades_to_similarity_order() {
        let entries: Vec<(String, f32)> =
            (0..8).map(|i| (format!("f{i}.py"), 0.9 - i as f32 * 0.1)).collect();
        let borrowed: Vec<(&str, f32)> = entries.iter().map(|(p, s)| (p.as_str(), *s)).collect();
        let (ranker, ws) = ranker_over(&borrowed).await;
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("not json at all".into())]));
        let ranker = ranker.with_reranker(LlmReranker::new(provider.clone(), "m"));

        let out = ranker.rank(&ws, QUERY, None, 4).await.unwrap();
        assert_eq!(paths(&out), vec!["f0.py", "f1.py", "f2.py", "f3.py"]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn rerank_ordering_applies_before_truncation() {
        let entries: Vec<(String, f32)> =
            (0..8).map(|i| (format!("f{i}.py"), 0.9 - i as f32 * 0.1)).collect();
        let borrowed: Vec<(&str, f32)> = entries.iter().map(|(p, s)| (p.as_str(), *s)).collect();
        let (ranker, ws) = ranker_over(&borrowed).await;
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("[5, 2]".into())]));
        let ranker = ranker.with_reranker(LlmReranker::new(provider, "m"));

        let out = ranker.rank(&ws, QUERY, None, 3).await.unwrap();
        assert_eq!(paths(&out), vec!["f5.py", "f2.py", "f0.py"]);
    }

    #[tokio::test]
    async fn task_reaches_the_rerank_prompt() {
        let entries: Vec<(String, f32)> =
            (0..8).map(|i| (format!("f{i}.py"), 0.9 - i as f32 * 0.1)).collect();
        let borrowed: Vec<(&str, f32)> = entries.iter().map(|(p, s)| (p.as_str(), *s)).collect();
        let (ranker, ws) = ranker_over(&borrowed).await;
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("[1]".into())]));
        let ranker = ranker.with_reranker(LlmReranker::new(provider.clone(), "m"));

        let out = ranker
            .rank_for_task(&ws, QUERY, "refactor", None, 3)
            .await
            .unwrap();
        assert_eq!(paths(&out), vec!["f1.py", "f0.py", "f2.py"]);

        let sent = provider.requests.lock().unwrap();
        assert!(sent[0].messages[0].content.contains("for a refactor task"));
    }

    #[tokio::test]
    async fn retriever_returns_snippets() {
        let (ranker, ws) = ranker_over(&[("a.py", 0.5), ("b.py", 0.9)]).await;
        let snippets = ranker.search(&ws, QUERY).await.unwrap();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].file_path, "b.py");
        assert_eq!(snippets[0].content, "code in b.py");
    }

    fn context(path: &str, similarity: f32) -> RetrievedContext {
        let chunk = Chunk::window(path, "x".into(), 1, 1, "py");
        crate::store::to_context(&chunk, similarity)
    }
}
