//! Ingestion processing: quota policy, the pipeline, and background execution

pub mod job_queue;
pub mod outcome;
pub mod pipeline;
pub mod quota;
pub mod worker;

pub use job_queue::{InFlightJob, JobQueue, JobState, QueueStats};
pub use outcome::{IngestOutcome, IngestReport};
pub use pipeline::IngestPipeline;
pub use quota::{QuotaDecision, QuotaLimits, QuotaPolicy};
pub use worker::ProcessingWorker;
