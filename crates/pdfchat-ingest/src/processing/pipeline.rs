//! The upload-completion pipeline: record, fetch, parse, quota, embed, index, complete

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::{ChunkingConfig, IngestConfig, ProcessingConfig};
use crate::error::{Error, Result};
use crate::ingestion::{chunk_pages, FileFetcher, ParsedPdf, PdfParser};
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::storage::IngestDb;
use crate::types::{Chunk, FileRecord, JobCompletion, UploadCompleteEvent};

use super::outcome::{IngestOutcome, IngestReport};
use super::quota::{QuotaDecision, QuotaPolicy};

/// Facts gathered during a run, recorded whatever the outcome
#[derive(Debug, Default)]
struct RunStats {
    page_count: Option<u32>,
    vectors_indexed: u32,
    content_hash: Option<String>,
}

/// Runs one trigger event to completion. Never returns an error to the caller.
pub struct IngestPipeline {
    db: Arc<IngestDb>,
    fetcher: Arc<dyn FileFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    quota: QuotaPolicy,
    chunking: ChunkingConfig,
    processing: ProcessingConfig,
    namespace: String,
    embed_batch_size: usize,
    upsert_batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        config: &IngestConfig,
        db: Arc<IngestDb>,
        fetcher: Arc<dyn FileFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            db,
            fetcher,
            embedder,
            index,
            quota: QuotaPolicy::new(config.plans.clone()),
            chunking: config.chunking.clone(),
            processing: config.processing.clone(),
            namespace: config.vector_index.namespace.clone(),
            embed_batch_size: config.embeddings.batch_size.max(1),
            upsert_batch_size: config.vector_index.upsert_batch_size.max(1),
        }
    }

    /// Process an upload-completion event.
    ///
    /// Duplicate deliveries of a storage key are no-ops. Otherwise a PROCESSING
    /// record is created before any slow work and moved to SUCCESS or FAILED at
    /// the end.
    pub async fn run(&self, event: UploadCompleteEvent) -> IngestReport {
        let key = event.storage_key.clone();

        let record = FileRecord::processing(
            event.storage_key.clone(),
            event.display_name.clone(),
            event.metadata.user_id.clone(),
            event.file_url.clone(),
        );

        let record = match self
            .blocking_db(move |db| db.create_if_absent(&record))
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!("[{}] Already recorded, ignoring duplicate trigger", key);
                return IngestReport::Duplicate { storage_key: key };
            }
            Err(e) => {
                tracing::error!("[{}] Could not create file record: {}", key, e);
                return IngestReport::NotStarted {
                    storage_key: key,
                    reason: e.to_string(),
                };
            }
        };

        tracing::info!(
            "[{}] Ingesting '{}' for user {} (record {})",
            key,
            record.name,
            record.user_id,
            record.id
        );

        let start_time = Instant::now();
        let mut stats = RunStats::default();
        let file_timeout = self.processing.file_timeout();

        let outcome = match timeout(file_timeout, self.process(&record, &event, &mut stats)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => IngestOutcome::from_error(&e),
            Err(_) => IngestOutcome::from_error(&Error::Timeout {
                stage: "ingest",
                secs: file_timeout.as_secs(),
            }),
        };

        match &outcome {
            IngestOutcome::Success => tracing::info!(
                "[{}] Indexed {} vectors from {} pages in {:.1}s",
                key,
                stats.vectors_indexed,
                stats.page_count.unwrap_or(0),
                start_time.elapsed().as_secs_f64()
            ),
            IngestOutcome::QuotaExceeded(reason) => {
                tracing::info!("[{}] Rejected: {}", key, reason)
            }
            IngestOutcome::TransientFailure(reason) | IngestOutcome::FatalFailure(reason) => {
                tracing::warn!(
                    "[{}] Failed ({}) after {:.1}s: {}",
                    key,
                    outcome.kind().as_str(),
                    start_time.elapsed().as_secs_f64(),
                    reason
                );
                if stats.vectors_indexed > 0 {
                    tracing::warn!(
                        "[{}] {} vectors were written before the failure and remain in the index",
                        key,
                        stats.vectors_indexed
                    );
                }
            }
        }

        let status_recorded = self.record_outcome(&record, &outcome, &stats).await;

        IngestReport::Completed {
            file_id: record.id,
            outcome,
            page_count: stats.page_count,
            vectors_indexed: stats.vectors_indexed,
            status_recorded,
        }
    }

    /// Steps after record creation. Errors are classified by the caller.
    async fn process(
        &self,
        record: &FileRecord,
        event: &UploadCompleteEvent,
        stats: &mut RunStats,
    ) -> Result<IngestOutcome> {
        let key = &record.key;
        let limits = self.quota.limits_for(&event.metadata.subscription_plan)?;

        let fetched = with_timeout(
            "fetch",
            self.processing.fetch_timeout(),
            self.fetcher.fetch(&event.file_url, limits.max_file_size_bytes),
        )
        .await?;
        tracing::debug!("[{}] Fetched {} bytes", key, fetched.bytes.len());

        let parsed = self.parse(&record.name, fetched.bytes).await?;
        stats.page_count = Some(parsed.page_count());
        stats.content_hash = Some(parsed.content_hash.clone());

        if let QuotaDecision::Exceeded { pages, max_pages } =
            QuotaPolicy::check(&limits, parsed.page_count())
        {
            return Ok(IngestOutcome::QuotaExceeded(format!(
                "{} pages exceeds the {}-page limit of the '{}' plan",
                pages, max_pages, limits.tier
            )));
        }

        let mut chunks = chunk_pages(record, &parsed, &self.chunking);
        if chunks.is_empty() {
            return Err(Error::file_parse(
                &record.name,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        tracing::debug!(
            "[{}] {} pages -> {} chunks",
            key,
            parsed.page_count(),
            chunks.len()
        );

        self.embed(key, &mut chunks).await?;
        self.index(key, &chunks, stats).await?;

        Ok(IngestOutcome::Success)
    }

    /// Run a database call on the blocking pool
    async fn blocking_db<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&IngestDb) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || call(&db))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Parse on the blocking pool under the parse timeout
    async fn parse(&self, filename: &str, bytes: bytes::Bytes) -> Result<ParsedPdf> {
        let filename = filename.to_string();
        let task = tokio::task::spawn_blocking(move || PdfParser::parse(&filename, &bytes));

        with_timeout("parse", self.processing.parse_timeout(), async move {
            task.await
                .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
        })
        .await
    }

    /// Fill every chunk's embedding, one batch at a time
    async fn embed(&self, key: &str, chunks: &mut [Chunk]) -> Result<()> {
        let embed_timeout = self.processing.embed_timeout();

        for (batch_no, batch) in chunks.chunks_mut(self.embed_batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings =
                with_timeout("embedding", embed_timeout, self.embedder.embed_batch(&texts)).await?;

            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
            tracing::debug!("[{}] Embedded batch {} ({} chunks)", key, batch_no + 1, batch.len());
        }

        Ok(())
    }

    /// Upsert in batches; the first failing batch fails the run
    async fn index(&self, key: &str, chunks: &[Chunk], stats: &mut RunStats) -> Result<()> {
        let index_timeout = self.processing.index_timeout();

        for batch in chunks.chunks(self.upsert_batch_size) {
            let written = with_timeout(
                "indexing",
                index_timeout,
                self.index.upsert(&self.namespace, batch),
            )
            .await?;

            stats.vectors_indexed += written as u32;
            if written != batch.len() {
                return Err(Error::vector_index(format!(
                    "{} wrote {} of {} vectors",
                    self.index.name(),
                    written,
                    batch.len()
                )));
            }
        }

        tracing::debug!(
            "[{}] Upserted {} vectors into namespace '{}' via {}",
            key,
            stats.vectors_indexed,
            self.namespace,
            self.index.name()
        );
        Ok(())
    }

    /// Fail a record whose run died without reporting, e.g. a panicked task.
    ///
    /// Only a record still PROCESSING is touched.
    pub async fn abandon(&self, storage_key: &str, reason: &str) -> IngestReport {
        let key = storage_key.to_string();
        let record = match self.blocking_db(move |db| db.get_by_key(&key)).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return IngestReport::NotStarted {
                    storage_key: storage_key.to_string(),
                    reason: reason.to_string(),
                }
            }
            Err(e) => {
                tracing::error!("[{}] Could not look up abandoned record: {}", storage_key, e);
                return IngestReport::NotStarted {
                    storage_key: storage_key.to_string(),
                    reason: reason.to_string(),
                };
            }
        };

        let outcome = IngestOutcome::FatalFailure(reason.to_string());
        let stats = RunStats::default();
        let status_recorded = self.record_outcome(&record, &outcome, &stats).await;

        IngestReport::Completed {
            file_id: record.id,
            outcome,
            page_count: None,
            vectors_indexed: 0,
            status_recorded,
        }
    }

    /// Write the terminal status. A failed write is logged and left alone.
    async fn record_outcome(
        &self,
        record: &FileRecord,
        outcome: &IngestOutcome,
        stats: &RunStats,
    ) -> bool {
        let completion = JobCompletion {
            reason: outcome.reason().map(|r| r.to_string()),
            page_count: stats.page_count,
            vectors_indexed: Some(stats.vectors_indexed),
            content_hash: stats.content_hash.clone(),
        };
        let file_id = record.id;
        let status = outcome.upload_status();
        let kind = outcome.kind();

        match self
            .blocking_db(move |db| db.complete(file_id, status, kind, &completion))
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(
                    "[{}] Record {} was no longer PROCESSING, status left unchanged",
                    record.key,
                    record.id
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    "[{}] Could not record {} for {}: {}. Record stays PROCESSING",
                    record.key,
                    outcome.upload_status(),
                    record.id,
                    e
                );
                false
            }
        }
    }
}

/// Apply a stage timeout, mapping expiry to `Error::Timeout`
async fn with_timeout<T, F>(stage: &'static str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            stage,
            secs: limit.as_secs(),
        }),
    }
}
