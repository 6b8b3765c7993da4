//! One-shot analysis: retrieve, stream an explanation, then propose actions.

use crate::generator::{ActionGenerator, format_context};
use crate::goal::AnalysisGoal;
use chrono::Utc;
use repolens_core::error::AgentError;
use repolens_core::{
    Action, DomainEvent, EventBus, Message, Provider, ProviderRequest, RetrievedContext,
    WorkspaceId,
};
use repolens_index::HybridRanker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_TOP_K: usize = 10;
const SUMMARY_CHARS: usize = 500;
const RETURNED_CONTEXTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub workspace_id: WorkspaceId,
    pub query: String,
    #[serde(default)]
    pub goal: AnalysisGoal,
    /// The file the user is looking at; enables locality boosting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub request_id: String,
    pub summary: String,
    pub detailed_analysis: String,
    pub relevant_contexts: Vec<RetrievedContext>,
    pub suggested_actions: Vec<Action>,
    pub follow_up_questions: Vec<String>,
    pub execution_time_ms: u64,
}

pub struct AnalysisService {
    ranker: Arc<HybridRanker>,
    provider: Arc<dyn Provider>,
    generator: ActionGenerator,
    model: String,
    default_top_k: usize,
    temperature: f32,
    max_tokens: u32,
    events: Option<Arc<EventBus>>,
}

impl AnalysisService {
    pub fn new(
        ranker: Arc<HybridRanker>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            generator: ActionGenerator::new(provider.clone(), &model),
            ranker,
            provider,
            model,
            default_top_k: DEFAULT_TOP_K,
            temperature: 0.2,
            max_tokens: 4096,
            events: None,
        }
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self.generator = self.generator.with_sampling(temperature, max_tokens);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AgentError> {
        self.analyze_streaming(request, |_| {}).await
    }

    /// Like [`analyze`](Self::analyze), handing each text delta to `on_delta`
    /// as it arrives.
    pub async fn analyze_streaming<F>(
        &self,
        request: AnalysisRequest,
        mut on_delta: F,
    ) -> Result<AnalysisResponse, AgentError>
    where
        F: FnMut(&str) + Send,
    {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let top_k = request.top_k.unwrap_or(self.default_top_k);

        let contexts = match self
            .ranker
            .rank_for_task(
                &request.workspace_id,
                &request.query,
                request.goal.as_str(),
                request.file_path.as_deref(),
                top_k,
            )
            .await
        {
            Ok(contexts) => contexts,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Retrieval failed, analysing without context");
                Vec::new()
            }
        };

        let stream_request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(analysis_prompt(&request.query, request.goal)),
                Message::user(format_context(&request.query, &contexts)),
            ],
        )
        .with_sampling(self.temperature, self.max_tokens);

        let mut rx = self
            .provider
            .stream(stream_request)
            .await
            .map_err(AgentError::Analysis)?;
        let mut analysis = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.map_err(AgentError::Analysis)?;
            if let Some(delta) = chunk.content.as_deref().filter(|d| !d.is_empty()) {
                on_delta(delta);
                analysis.push_str(delta);
            }
            if chunk.done {
                break;
            }
        }

        let actions = self
            .generator
            .generate(&request.query, &contexts, request.goal, None)
            .await;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        if let Some(events) = &self.events {
            events.publish(DomainEvent::AnalysisCompleted {
                request_id: request_id.clone(),
                contexts: contexts.len(),
                actions: actions.len(),
                duration_ms: execution_time_ms,
                timestamp: Utc::now(),
            });
        }
        info!(
            request_id = %request_id,
            goal = %request.goal,
            contexts = contexts.len(),
            actions = actions.len(),
            elapsed_ms = execution_time_ms,
            "Analysis complete"
        );

        Ok(AnalysisResponse {
            request_id,
            summary: summarize(&analysis),
            detailed_analysis: analysis,
            relevant_contexts: contexts.into_iter().take(RETURNED_CONTEXTS).collect(),
            suggested_actions: actions,
            follow_up_questions: request.goal.follow_up_questions(),
            execution_time_ms,
        })
    }
}

/// The first 500 characters, with `...` when anything was cut.
pub fn summarize(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn analysis_prompt(query: &str, goal: AnalysisGoal) -> String {
    format!(
        "You are an expert code analyst. Goal: {goal}.\n{}\n\n\
         Your response must specifically address: '{query}'\n\
         Use the provided context only as a reference. If it does not contain enough \
         information, state exactly what is missing and suggest specific search terms.\n\
         Be technical and precise.",
        goal.analysis_instruction()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use repolens_core::ActionKind;

    fn service(provider: Arc<dyn Provider>, ranker: HybridRanker) -> AnalysisService {
        AnalysisService::new(Arc::new(ranker), provider, "mock-model")
    }

    fn request(file_path: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            workspace_id: WorkspaceId::new("demo").unwrap(),
            query: "why does login fail".into(),
            goal: AnalysisGoal::Debug,
            file_path: file_path.map(String::from),
            top_k: Some(4),
        }
    }

    fn streaming(pieces: Vec<&'static str>) -> Arc<StreamingMockProvider> {
        Arc::new(StreamingMockProvider {
            pieces,
            tool_response: make_tool_call_response(
                vec![make_tool_call(
                    "edit_file",
                    serde_json::json!({"file_path": "src/auth.py", "replacement": "x", "explanation": "fix"}),
                )],
                "Token may be None.",
            ),
        })
    }

    #[tokio::test]
    async fn full_analysis_flow() {
        let ranker = ranker_over(&["src/auth.py", "src/db.py", "src/api.py", "src/cli.py"]).await;
        let mut seen = Vec::new();
        let response = service(streaming(vec!["Root cause: ", "missing check."]), ranker)
            .analyze_streaming(request(Some("src/auth.py")), |d| seen.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["Root cause: ", "missing check."]);
        assert_eq!(response.detailed_analysis, "Root cause: missing check.");
        assert_eq!(response.summary, response.detailed_analysis);
        assert_eq!(response.relevant_contexts.len(), 3);
        assert_eq!(response.relevant_contexts[0].metadata.file_path, "src/auth.py");
        assert_eq!(response.suggested_actions.len(), 1);
        assert_eq!(response.suggested_actions[0].kind, ActionKind::Edit);
        assert_eq!(
            response.follow_up_questions,
            AnalysisGoal::Debug.follow_up_questions()
        );
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_no_context() {
        let ranker = failing_ranker();
        let response = service(streaming(vec!["General advice."]), ranker)
            .analyze(request(None))
            .await
            .unwrap();
        assert!(response.relevant_contexts.is_empty());
        assert_eq!(response.detailed_analysis, "General advice.");
    }

    #[test]
    fn summary_truncates_at_500_chars() {
        let long = "é".repeat(600);
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), 503);
        assert!(summary.ends_with("..."));
        assert_eq!(summarize("short"), "short");
    }

    #[test]
    fn request_defaults_goal_when_missing() {
        let req: AnalysisRequest =
            serde_json::from_str(r#"{"workspace_id":"demo","query":"q"}"#).unwrap();
        assert_eq!(req.goal, AnalysisGoal::Explain);
        assert!(req.top_k.is_none());
    }
}
