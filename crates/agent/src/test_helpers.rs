//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use repolens_core::error::{IndexError, ProviderError, ToolError};
use repolens_core::provider::{ProviderResponse, StreamReceiver, Usage};
use repolens_core::{
    ActionExecutor, ConstructKind, ContextMetadata, ContextRetriever, ExecutionReport,
    ExecutionRequest, ExecutionStatus, Message, MessageToolCall, Provider, ProviderRequest,
    RetrievedContext, RetrievedSnippet, StreamChunk, WorkspaceId,
};
use std::sync::{Arc, Mutex};

/// A mock provider that returns a sequence of scripted responses.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let n = requests.len();
        requests.push(request);
        match self.responses.get(n) {
            Some(r) => r.clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{n}, have {})",
                self.responses.len()
            ),
        }
    }
}

/// Streams fixed text pieces, one chunk each.
pub struct StreamingMockProvider {
    pub pieces: Vec<&'static str>,
    pub tool_response: ProviderResponse,
}

#[async_trait]
impl Provider for StreamingMockProvider {
    fn name(&self) -> &str {
        "streaming_mock"
    }

    async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(self.tool_response.clone())
    }

    async fn stream(&self, _: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        let (tx, rx) = tokio::sync::mpsc::channel(self.pieces.len() + 1);
        for piece in &self.pieces {
            tx.send(Ok(StreamChunk {
                content: Some(piece.to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        }
        tx.send(Ok(StreamChunk {
            done: true,
            ..Default::default()
        }))
        .await
        .unwrap();
        Ok(rx)
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn make_context(path: &str, content: &str, score: f32) -> RetrievedContext {
    RetrievedContext {
        id: format!("{path}:id"),
        content: content.to_string(),
        metadata: ContextMetadata {
            file_path: path.to_string(),
            line_start: 1,
            line_end: 10,
            construct_kind: ConstructKind::Function,
            name: "f".into(),
            language: "py".into(),
        },
        similarity_score: score,
        boosted_score: score,
    }
}

/// Returns fixed snippets and records queries.
#[derive(Default)]
pub struct StaticRetriever {
    pub paths: Vec<&'static str>,
    pub fail: bool,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl ContextRetriever for StaticRetriever {
    async fn search(
        &self,
        _workspace: &WorkspaceId,
        query: &str,
    ) -> Result<Vec<RetrievedSnippet>, IndexError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(IndexError::QueryFailed("index offline".into()));
        }
        Ok(self
            .paths
            .iter()
            .map(|p| RetrievedSnippet::from(make_context(p, "code", 0.5)))
            .collect())
    }
}

/// Reports a fixed status and records every request.
pub struct RecordingExecutor {
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub fail: bool,
    pub requests: Mutex<Vec<ExecutionRequest>>,
}

impl RecordingExecutor {
    pub fn new(status: ExecutionStatus, output: Option<&str>) -> Self {
        Self {
            status,
            output: output.map(String::from),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ToolError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(ToolError::ExecutionFailed {
                tool_name: "executor".into(),
                reason: "disk full".into(),
            });
        }
        Ok(ExecutionReport::new(self.status, self.output.clone()))
    }
}

/// Embeds every text as `[1, 0]`, or fails when `fail` is set.
pub struct PinnedEmbedder {
    pub fail: bool,
}

#[async_trait]
impl repolens_core::Embedder for PinnedEmbedder {
    fn name(&self) -> &str {
        "pinned"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Network("embedding service down".into()));
        }
        Ok(vec![1.0, 0.0])
    }
}

/// A ranker over `paths`, with similarity to any query decreasing by 0.1
/// per position starting at 0.9.
pub async fn ranker_over(paths: &[&str]) -> repolens_index::HybridRanker {
    use repolens_index::{EmbeddedChunk, InMemoryStore, VectorIndex, VectorStore};

    let store = Arc::new(InMemoryStore::new());
    let records = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let sim = 0.9 - i as f32 * 0.1;
            EmbeddedChunk {
                chunk: repolens_core::Chunk::window(path, format!("code in {path}"), 1, 10, "py"),
                embedding: vec![sim, (1.0 - sim * sim).sqrt()],
            }
        })
        .collect();
    store
        .upsert(&WorkspaceId::new("demo").unwrap(), records)
        .await
        .unwrap();
    let index = VectorIndex::new(store, Arc::new(PinnedEmbedder { fail: false }));
    repolens_index::HybridRanker::new(Arc::new(index))
}

pub fn failing_ranker() -> repolens_index::HybridRanker {
    use repolens_index::{InMemoryStore, VectorIndex};

    let index = VectorIndex::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(PinnedEmbedder { fail: true }),
    );
    repolens_index::HybridRanker::new(Arc::new(index))
}
