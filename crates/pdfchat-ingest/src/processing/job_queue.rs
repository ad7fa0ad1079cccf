//! In-process queue between the trigger endpoint and the worker

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::types::UploadCompleteEvent;

use super::outcome::{IngestOutcome, IngestReport};

/// Where a delivery currently is
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
}

/// A storage key the queue has accepted but not finished
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightJob {
    pub storage_key: String,
    pub state: JobState,
    /// Deliveries of this key received while it was in flight, the first included
    pub deliveries: usize,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicUsize,
    succeeded: AtomicUsize,
    quota_exceeded: AtomicUsize,
    transient_failures: AtomicUsize,
    fatal_failures: AtomicUsize,
    duplicates: AtomicUsize,
    not_started: AtomicUsize,
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub accepted: usize,
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub quota_exceeded: usize,
    pub transient_failures: usize,
    pub fatal_failures: usize,
    pub duplicates: usize,
    pub not_started: usize,
    pub worker_count: usize,
}

/// Bounded queue of trigger events with in-flight tracking
pub struct JobQueue {
    sender: mpsc::Sender<UploadCompleteEvent>,
    in_flight: Arc<DashMap<String, InFlightJob>>,
    counters: Counters,
    worker_count: usize,
}

impl JobQueue {
    /// Create a queue holding up to `capacity` pending events
    pub fn new(capacity: usize, worker_count: usize) -> (Self, mpsc::Receiver<UploadCompleteEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            sender,
            in_flight: Arc::new(DashMap::new()),
            counters: Counters::default(),
            worker_count,
        };

        (queue, receiver)
    }

    /// Enqueue an event, waiting while the queue is full.
    ///
    /// A redelivery of a key that is already queued or running is absorbed
    /// here and counted as a duplicate; it never reaches the worker.
    pub async fn submit(&self, event: UploadCompleteEvent) -> Result<()> {
        let key = event.storage_key.clone();

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut job) => {
                job.get_mut().deliveries += 1;
                self.counters.accepted.fetch_add(1, Ordering::SeqCst);
                self.counters.duplicates.fetch_add(1, Ordering::SeqCst);
                tracing::info!("[{}] Already in flight, ignoring redelivery", key);
                return Ok(());
            }
            Entry::Vacant(slot) => {
                slot.insert(InFlightJob {
                    storage_key: key.clone(),
                    state: JobState::Queued,
                    deliveries: 1,
                    accepted_at: Utc::now(),
                });
            }
        }

        if let Err(e) = self.sender.send(event).await {
            self.release(&key);
            tracing::error!("[{}] Failed to enqueue: {}", key, e);
            return Err(Error::internal("ingest queue is closed"));
        }

        self.counters.accepted.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[{}] Queued for ingestion", key);
        Ok(())
    }

    /// Called by the worker when it starts a run
    pub fn mark_running(&self, storage_key: &str) {
        if let Some(mut job) = self.in_flight.get_mut(storage_key) {
            job.state = JobState::Running;
        }
    }

    /// Called by the worker when a run returns
    pub fn finish(&self, storage_key: &str, report: &IngestReport) {
        let counter = match report {
            IngestReport::Duplicate { .. } => &self.counters.duplicates,
            IngestReport::NotStarted { .. } => &self.counters.not_started,
            IngestReport::Completed { outcome, .. } => match outcome {
                IngestOutcome::Success => &self.counters.succeeded,
                IngestOutcome::QuotaExceeded(_) => &self.counters.quota_exceeded,
                IngestOutcome::TransientFailure(_) => &self.counters.transient_failures,
                IngestOutcome::FatalFailure(_) => &self.counters.fatal_failures,
            },
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.release(storage_key);
    }

    fn release(&self, storage_key: &str) {
        self.in_flight.remove(storage_key);
    }

    /// Keys accepted but not finished, oldest first
    pub fn in_flight(&self) -> Vec<InFlightJob> {
        let mut jobs: Vec<InFlightJob> = self.in_flight.iter().map(|j| j.value().clone()).collect();
        jobs.sort_by_key(|j| j.accepted_at);
        jobs
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let running = self
            .in_flight
            .iter()
            .filter(|j| j.state == JobState::Running)
            .count();

        QueueStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            queued: self.in_flight.len().saturating_sub(running),
            running,
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            quota_exceeded: self.counters.quota_exceeded.load(Ordering::SeqCst),
            transient_failures: self.counters.transient_failures.load(Ordering::SeqCst),
            fatal_failures: self.counters.fatal_failures.load(Ordering::SeqCst),
            duplicates: self.counters.duplicates.load(Ordering::SeqCst),
            not_started: self.counters.not_started.load(Ordering::SeqCst),
            worker_count: self.worker_count,
        }
    }

    /// Runs that have returned, whatever their outcome
    pub fn completed(&self) -> usize {
        let stats = self.stats();
        stats.succeeded
            + stats.quota_exceeded
            + stats.transient_failures
            + stats.fatal_failures
            + stats.duplicates
            + stats.not_started
    }
}
