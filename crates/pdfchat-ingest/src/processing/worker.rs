//! Background worker draining the job queue

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::types::UploadCompleteEvent;

use super::job_queue::JobQueue;
use super::pipeline::IngestPipeline;

/// Runs queued events through the pipeline, a bounded number at a time
pub struct ProcessingWorker {
    pipeline: Arc<IngestPipeline>,
    job_queue: Arc<JobQueue>,
    concurrency: usize,
}

impl ProcessingWorker {
    pub fn new(pipeline: Arc<IngestPipeline>, job_queue: Arc<JobQueue>, concurrency: usize) -> Self {
        Self {
            pipeline,
            job_queue,
            concurrency: concurrency.max(1),
        }
    }

    /// Process events until every sender is dropped
    pub async fn run(self, mut receiver: mpsc::Receiver<UploadCompleteEvent>) {
        tracing::info!(
            "Processing worker started: {} concurrent documents",
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        while let Some(event) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let pipeline = self.pipeline.clone();
            let job_queue = self.job_queue.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let key = event.storage_key.clone();

                job_queue.mark_running(&key);
                let run = tokio::spawn({
                    let pipeline = pipeline.clone();
                    async move { pipeline.run(event).await }
                });

                // The key must leave the in-flight set even if the run panicked
                let report = match run.await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::error!("[{}] Ingest task aborted: {}", key, e);
                        pipeline
                            .abandon(&key, &format!("ingest task aborted: {}", e))
                            .await
                    }
                };
                job_queue.finish(&key, &report);
            });
        }

        tracing::info!("Processing worker stopped: queue closed");
    }
}
