//! Assembly of the retrieval and agent subsystems from an [`AppConfig`].
//!
//! Built once per process and shared by the HTTP routes and the CLI.

use repolens_agent::{AgentLoop, AnalysisService};
use repolens_config::AppConfig;
use repolens_core::{ActionExecutor, Embedder, Error, EventBus, Provider};
use repolens_index::{
    HybridRanker, IngestionPipeline, LlmReranker, OrphanPolicy, SqliteStore, VectorIndex,
    VectorStore,
};
use repolens_ingest::Chunker;
use repolens_providers::{build_embedder, build_from_config};
use repolens_tools::{DryRunExecutor, LocalActionExecutor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct Engine {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub index: Arc<VectorIndex>,
    pub ranker: Arc<HybridRanker>,
    pub pipeline: Arc<IngestionPipeline>,
    pub analysis: Arc<AnalysisService>,
    pub events: Arc<EventBus>,
}

impl Engine {
    /// Build the configured provider and open the SQLite index.
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let provider = build_from_config(&config)?;
        let embedder: Arc<dyn Embedder> = Arc::new(build_embedder(&config, provider.clone()));
        let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::open(&config.index.path).await?);
        info!(index = %config.index.path.display(), "Index opened");
        Self::assemble(config, provider, store, embedder)
    }

    /// Wire the subsystems around explicit collaborators.
    pub fn assemble(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, Error> {
        let orphan_policy: OrphanPolicy = config
            .index
            .orphan_policy
            .parse()
            .map_err(|message| Error::Config { message })?;
        let events = Arc::new(EventBus::default());
        let chat_model = config.provider.chat_model.clone();

        let index = Arc::new(
            VectorIndex::new(store, embedder).with_batch_size(config.embedding.batch_size),
        );

        let mut ranker = HybridRanker::new(index.clone())
            .with_query_instruction(&config.embedding.query_instruction);
        if config.retrieval.rerank {
            ranker = ranker.with_reranker(
                LlmReranker::new(provider.clone(), &chat_model)
                    .with_threshold(config.retrieval.rerank_threshold),
            );
        }
        let ranker = Arc::new(ranker);

        let pipeline = IngestionPipeline::new(Chunker::new(config.ingest.clone()), index.clone())
            .with_flush_size(config.ingest.flush_size)
            .with_orphan_policy(orphan_policy)
            .with_events(events.clone());

        let analysis = AnalysisService::new(ranker.clone(), provider.clone(), &chat_model)
            .with_default_top_k(config.retrieval.default_top_k)
            .with_sampling(config.provider.temperature, config.provider.max_tokens)
            .with_events(events.clone());

        Ok(Self {
            config,
            provider,
            index,
            ranker,
            pipeline: Arc::new(pipeline),
            analysis: Arc::new(analysis),
            events,
        })
    }

    /// A writing executor rooted at `repo_root` when edits are enabled,
    /// otherwise a dry run.
    pub fn executor_for(&self, repo_root: Option<&Path>) -> Arc<dyn ActionExecutor> {
        let agent = &self.config.agent;
        match repo_root {
            Some(root) if agent.apply_edits => Arc::new(
                LocalActionExecutor::new(root, agent.allowed_test_commands.clone())
                    .with_test_timeout(Duration::from_secs(agent.test_timeout_secs)),
            ),
            _ => Arc::new(DryRunExecutor::new()),
        }
    }

    /// A fresh agent session searching through the hybrid ranker.
    pub fn agent(&self, executor: Arc<dyn ActionExecutor>, max_iterations: Option<u32>) -> AgentLoop {
        AgentLoop::new(
            self.provider.clone(),
            &self.config.provider.chat_model,
            self.ranker.clone(),
            executor,
        )
        .with_max_iterations(max_iterations.unwrap_or(self.config.agent.max_iterations))
        .with_sampling(self.config.provider.temperature, self.config.provider.max_tokens)
        .with_events(self.events.clone())
    }
}
