//! Application state for the ingestion server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::{BackendProvider, IngestConfig};
use crate::error::Result;
use crate::ingestion::HttpFetcher;
use crate::processing::{IngestPipeline, JobQueue, ProcessingWorker};
use crate::providers::{
    EmbeddingProvider, LocalVectorIndex, OllamaEmbedder, OpenAiEmbedder, PineconeIndex,
    VectorIndex,
};
use crate::storage::IngestDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: IngestConfig,
    db: Arc<IngestDb>,
    /// Trigger events waiting for the worker
    job_queue: Arc<JobQueue>,
    embedder_name: String,
    index_name: String,
    ready: RwLock<bool>,
}

impl AppState {
    /// Open the database, build the configured backend and start the worker
    pub async fn new(config: IngestConfig) -> Result<Self> {
        tracing::info!("Initializing ingestion state (backend: {:?})...", config.backend);

        let db = Arc::new(IngestDb::new(&config.database.path)?);
        tracing::info!("Database opened at {}", config.database.path.display());

        let (embedder, index): (Arc<dyn EmbeddingProvider>, Arc<dyn VectorIndex>) =
            match config.backend {
                BackendProvider::Local => {
                    tracing::info!("Using local backend (Ollama + SQLite vectors)");
                    (
                        Arc::new(OllamaEmbedder::new(&config.embeddings)?),
                        Arc::new(LocalVectorIndex::new(db.clone())),
                    )
                }
                BackendProvider::Remote => {
                    tracing::info!("Using remote backend (OpenAI + Pinecone)");
                    (
                        Arc::new(OpenAiEmbedder::new(&config.embeddings)?),
                        Arc::new(PineconeIndex::new(&config.vector_index)?),
                    )
                }
            };

        if !embedder.health_check().await.unwrap_or(false) {
            tracing::warn!("Embedding provider '{}' is not reachable yet", embedder.name());
        }
        if !index.health_check().await.unwrap_or(false) {
            tracing::warn!("Vector index '{}' is not reachable yet", index.name());
        }

        let fetcher = Arc::new(HttpFetcher::new(config.processing.fetch_timeout())?);
        let pipeline = Arc::new(IngestPipeline::new(
            &config,
            db.clone(),
            fetcher,
            embedder.clone(),
            index.clone(),
        ));

        let state = Self::assemble(config, db, pipeline, embedder.name(), index.name());
        state.set_ready(true);
        Ok(state)
    }

    /// Wire a pipeline to a fresh job queue and spawn its worker
    pub fn assemble(
        config: IngestConfig,
        db: Arc<IngestDb>,
        pipeline: Arc<IngestPipeline>,
        embedder_name: &str,
        index_name: &str,
    ) -> Self {
        let concurrency = config.processing.concurrency();
        let (job_queue, receiver) = JobQueue::new(config.processing.queue_capacity, concurrency);
        let job_queue = Arc::new(job_queue);
        tracing::info!(
            "Job queue initialized (capacity {}, {} workers)",
            config.processing.queue_capacity,
            concurrency
        );

        let worker = ProcessingWorker::new(pipeline, job_queue.clone(), concurrency);
        tokio::spawn(worker.run(receiver));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                job_queue,
                embedder_name: embedder_name.to_string(),
                index_name: index_name.to_string(),
                ready: RwLock::new(false),
            }),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Arc<IngestDb> {
        &self.inner.db
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    pub fn embedder_name(&self) -> &str {
        &self.inner.embedder_name
    }

    pub fn index_name(&self) -> &str {
        &self.inner.index_name
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
