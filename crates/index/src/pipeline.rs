//! Ingestion pipeline: chunker stream in, batched index upserts out.

use crate::index::VectorIndex;
use chrono::Utc;
use repolens_core::error::IngestError;
use repolens_core::{Chunk, DomainEvent, EventBus, WorkspaceId};
use repolens_ingest::Chunker;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_FLUSH_SIZE: usize = 100;
const CHUNK_CHANNEL_CAPACITY: usize = 256;

/// What happens to stored chunks of a re-ingested file that the current run
/// no longer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    #[default]
    Prune,
    Retain,
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prune" => Ok(Self::Prune),
            "retain" => Ok(Self::Retain),
            other => Err(format!("unknown orphan policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file_path: String,
    pub reason: String,
}

impl From<&IngestError> for FileFailure {
    fn from(err: &IngestError) -> Self {
        Self {
            file_path: err.file_path().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_indexed: usize,
    pub chunks_upserted: usize,
    pub chunks_pruned: usize,
    pub errors: Vec<FileFailure>,
    pub cancelled: bool,
}

/// Chunk ids seen per file, in walk order. A file is complete once a chunk
/// from a different file arrives.
#[derive(Default)]
struct FileTracker {
    current: Option<(String, HashSet<String>)>,
    completed: Vec<(String, HashSet<String>)>,
}

impl FileTracker {
    fn record(&mut self, chunk: &Chunk) {
        match &mut self.current {
            Some((path, ids)) if *path == chunk.file_path => {
                ids.insert(chunk.id.clone());
            }
            _ => {
                self.finish_current();
                self.current = Some((chunk.file_path.clone(), HashSet::from([chunk.id.clone()])));
            }
        }
    }

    fn finish_current(&mut self) {
        if let Some(done) = self.current.take() {
            self.completed.push(done);
        }
    }
}

pub struct IngestionPipeline {
    chunker: Chunker,
    index: Arc<VectorIndex>,
    flush_size: usize,
    orphan_policy: OrphanPolicy,
    events: Option<Arc<EventBus>>,
}

impl IngestionPipeline {
    pub fn new(chunker: Chunker, index: Arc<VectorIndex>) -> Self {
        Self {
            chunker,
            index,
            flush_size: DEFAULT_FLUSH_SIZE,
            orphan_policy: OrphanPolicy::default(),
            events: None,
        }
    }

    pub fn with_flush_size(mut self, flush_size: usize) -> Self {
        self.flush_size = flush_size.max(1);
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Ingest every eligible file under `root` into `workspace`.
    ///
    /// The walk, file reads and parsing run on the blocking pool and feed a
    /// bounded channel. Per-file failures are logged and reported, not fatal.
    /// Embedding or storage failures abort the run. Cancellation stops the
    /// walk at the next file; chunks buffered at that point are dropped.
    pub async fn run(
        &self,
        workspace: &WorkspaceId,
        root: &Path,
        ignore_patterns: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, repolens_core::Error> {
        let stream = self.chunker.ingest_repository(root, ignore_patterns)?;
        let mut report = IngestReport::default();
        let mut tracker = FileTracker::default();
        let mut buffer: Vec<Chunk> =
            Vec::with_capacity(self.flush_size.min(CHUNK_CHANNEL_CAPACITY));

        info!(workspace = %workspace, root = %root.display(), "Ingestion started");

        let (tx, mut rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let walk_cancel = cancel.clone();
        let walker = tokio::task::spawn_blocking(move || {
            for item in stream {
                if walk_cancel.is_cancelled() || tx.blocking_send(item).is_err() {
                    break;
                }
            }
        });

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(workspace, report)),
                item = rx.recv() => item,
            };
            let Some(item) = item else { break };

            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, "Skipping file");
                    report.errors.push(FileFailure::from(&e));
                    continue;
                }
            };
            tracker.record(&chunk);
            buffer.push(chunk);

            if buffer.len() >= self.flush_size {
                if cancel.is_cancelled() {
                    return Ok(self.cancelled(workspace, report));
                }
                self.flush(workspace, &mut buffer, &mut report).await?;
                self.settle_completed(workspace, &mut tracker, &mut report)
                    .await?;
            }
        }

        walker.await.map_err(|e| {
            repolens_core::Error::Internal(format!("repository walk failed: {e}"))
        })?;

        if cancel.is_cancelled() {
            return Ok(self.cancelled(workspace, report));
        }
        tracker.finish_current();
        self.flush(workspace, &mut buffer, &mut report).await?;
        self.settle_completed(workspace, &mut tracker, &mut report)
            .await?;

        info!(
            workspace = %workspace,
            files = report.files_indexed,
            chunks = report.chunks_upserted,
            pruned = report.chunks_pruned,
            errors = report.errors.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn flush(
        &self,
        workspace: &WorkspaceId,
        buffer: &mut Vec<Chunk>,
        report: &mut IngestReport,
    ) -> Result<(), repolens_core::Error> {
        if buffer.is_empty() {
            return Ok(());
        }
        let stored = self.index.upsert(workspace, buffer).await?;
        buffer.clear();
        report.chunks_upserted += stored;

        if let Some(events) = &self.events {
            events.publish(DomainEvent::BatchIngested {
                workspace_id: workspace.to_string(),
                chunks: stored,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Runs after a flush, so every completed file is fully stored.
    async fn settle_completed(
        &self,
        workspace: &WorkspaceId,
        tracker: &mut FileTracker,
        report: &mut IngestReport,
    ) -> Result<(), repolens_core::Error> {
        for (file_path, ids) in tracker.completed.drain(..) {
            report.files_indexed += 1;
            if self.orphan_policy == OrphanPolicy::Prune {
                report.chunks_pruned += self.index.prune_file(workspace, &file_path, &ids).await?;
            }
        }
        Ok(())
    }

    fn cancelled(&self, workspace: &WorkspaceId, mut report: IngestReport) -> IngestReport {
        info!(
            workspace = %workspace,
            chunks = report.chunks_upserted,
            "Ingestion cancelled"
        );
        report.cancelled = true;
        report
    }
}
