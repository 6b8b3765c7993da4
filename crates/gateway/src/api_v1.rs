//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/ingest`          — Start a background ingestion job
//! - `GET    /v1/ingest/{id}`     — Job status and report
//! - `DELETE /v1/ingest/{id}`     — Cancel a running job
//! - `POST   /v1/search`          — Hybrid-ranked retrieval
//! - `POST   /v1/analyze`         — Analysis with suggested actions
//! - `POST   /v1/analyze/stream`  — The same, as SSE deltas then a result event
//! - `POST   /v1/agent`           — One bounded agent session

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::Engine;
use repolens_agent::{AgentOutcome, AnalysisRequest, AnalysisResponse};
use repolens_core::error::{AgentError, IndexError};
use repolens_core::{RetrievedContext, SearchFilters, WorkspaceId};
use repolens_index::IngestReport;

/// Finished jobs beyond this count are evicted, oldest first.
const MAX_JOBS: usize = 1_000;

// ── State ─────────────────────────────────────────────────────────────────

pub struct ApiV1State {
    pub engine: Arc<Engine>,
    pub jobs: RwLock<HashMap<String, JobEntry>>,
    /// Parent of every job and agent session token
    pub shutdown: CancellationToken,
}

impl ApiV1State {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            jobs: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

pub struct JobEntry {
    pub job: IngestJob,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: String,
    pub workspace_id: WorkspaceId,
    pub repo_path: PathBuf,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestReportDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReportDto {
    pub files_indexed: usize,
    pub chunks_upserted: usize,
    pub chunks_pruned: usize,
    pub failed_files: Vec<String>,
}

impl From<&IngestReport> for IngestReportDto {
    fn from(report: &IngestReport) -> Self {
        Self {
            files_indexed: report.files_indexed,
            chunks_upserted: report.chunks_upserted,
            chunks_pruned: report.chunks_pruned,
            failed_files: report.errors.iter().map(|f| f.file_path.clone()).collect(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/ingest", post(start_ingest_handler))
        .route(
            "/ingest/{id}",
            get(get_ingest_handler).delete(cancel_ingest_handler),
        )
        .route("/search", post(search_handler))
        .route("/analyze", post(analyze_handler))
        .route("/analyze/stream", post(analyze_stream_handler))
        .route("/agent", post(agent_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IngestRequest {
    pub workspace_id: WorkspaceId,
    pub repo_path: PathBuf,
    /// Replaces the configured ignore patterns
    #[serde(default)]
    pub ignore_patterns: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub workspace_id: WorkspaceId,
    pub query: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievedContext>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct AgentRequest {
    pub workspace_id: WorkspaceId,
    pub query: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Checkout the executor writes to when edits are enabled
    #[serde(default)]
    pub repo_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn index_error(e: IndexError) -> ApiError {
    let status = match &e {
        IndexError::InvalidWorkspace(_) => StatusCode::BAD_REQUEST,
        IndexError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn agent_error(e: AgentError) -> ApiError {
    let status = match &e {
        AgentError::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    api_error(status, e.to_string())
}

// ── Ingestion ─────────────────────────────────────────────────────────────

async fn start_ingest_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestJob>), ApiError> {
    if !req.repo_path.is_dir() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a directory", req.repo_path.display()),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let cancel = state.shutdown.child_token();
    let job = IngestJob {
        id: id.clone(),
        workspace_id: req.workspace_id.clone(),
        repo_path: req.repo_path.clone(),
        status: JobStatus::Running,
        report: None,
        error: None,
        started_at: Utc::now(),
        finished_at: None,
    };

    {
        let mut jobs = state.jobs.write().await;
        evict_finished(&mut jobs);
        jobs.insert(
            id.clone(),
            JobEntry {
                job: job.clone(),
                cancel: cancel.clone(),
            },
        );
    }

    info!(job = %id, workspace = %req.workspace_id, path = %req.repo_path.display(), "Ingestion job started");

    let task_state = state.clone();
    tokio::spawn(async move {
        let result = task_state
            .engine
            .pipeline
            .run(
                &req.workspace_id,
                &req.repo_path,
                req.ignore_patterns.as_deref(),
                &cancel,
            )
            .await;

        let mut jobs = task_state.jobs.write().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        entry.job.finished_at = Some(Utc::now());
        match result {
            Ok(report) => {
                entry.job.status = if report.cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                entry.job.report = Some(IngestReportDto::from(&report));
            }
            Err(e) => {
                warn!(job = %id, error = %e, "Ingestion job failed");
                entry.job.status = JobStatus::Failed;
                entry.job.error = Some(e.to_string());
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(job)))
}

fn evict_finished(jobs: &mut HashMap<String, JobEntry>) {
    while jobs.len() >= MAX_JOBS {
        let oldest = jobs
            .iter()
            .filter(|(_, e)| e.job.status != JobStatus::Running)
            .min_by_key(|(_, e)| e.job.started_at)
            .map(|(k, _)| k.clone());
        match oldest {
            Some(key) => {
                jobs.remove(&key);
            }
            None => break,
        }
    }
}

async fn get_ingest_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<IngestJob>, StatusCode> {
    let jobs = state.jobs.read().await;
    jobs.get(&id)
        .map(|e| Json(e.job.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_ingest_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<IngestJob>, StatusCode> {
    let jobs = state.jobs.read().await;
    let entry = jobs.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    if entry.job.status == JobStatus::Running {
        info!(job = %id, "Ingestion job cancellation requested");
        entry.cancel.cancel();
    }
    Ok(Json(entry.job.clone()))
}

// ── Retrieval and analysis ────────────────────────────────────────────────

async fn search_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let top_k = req
        .top_k
        .unwrap_or(state.engine.config.retrieval.default_top_k);
    let results = state
        .engine
        .ranker
        .rank_filtered(
            &req.workspace_id,
            &req.query,
            req.file_path.as_deref(),
            top_k,
            &req.filters,
        )
        .await
        .map_err(index_error)?;

    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

async fn analyze_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    info!(workspace = %req.workspace_id, goal = %req.goal, "v1/analyze request");
    state
        .engine
        .analysis
        .analyze(req)
        .await
        .map(Json)
        .map_err(agent_error)
}

/// Streams `delta` events carrying `{"delta": "..."}`, then one `result`
/// event with the full response or an `error` event.
async fn analyze_stream_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<AnalysisRequest>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<SseEvent>();

    tokio::spawn(async move {
        let delta_tx = tx.clone();
        let result = state
            .engine
            .analysis
            .analyze_streaming(req, move |delta| {
                if let Ok(event) = SseEvent::default()
                    .event("delta")
                    .json_data(serde_json::json!({ "delta": delta }))
                {
                    let _ = delta_tx.send(event);
                }
            })
            .await;

        let last = match result {
            Ok(response) => SseEvent::default().event("result").json_data(&response),
            Err(e) => SseEvent::default()
                .event("error")
                .json_data(ErrorResponse {
                    error: e.to_string(),
                }),
        };
        match last {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!(error = %e, "Failed to encode final analysis event"),
        }
    });

    Sse::new(UnboundedReceiverStream::new(rx).map(Ok))
}

// ── Agent ─────────────────────────────────────────────────────────────────

async fn agent_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentOutcome>, ApiError> {
    if let Some(path) = &req.repo_path
        && !path.is_dir()
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a directory", path.display()),
        ));
    }

    info!(workspace = %req.workspace_id, "v1/agent request");
    let executor = state.engine.executor_for(req.repo_path.as_deref());
    let agent = state.engine.agent(executor, req.max_iterations);
    let cancel = state.shutdown.child_token();

    agent
        .run(&req.workspace_id, &req.query, &cancel)
        .await
        .map(Json)
        .map_err(agent_error)
}
