//! Core types for the ingestion pipeline

pub mod document;
pub mod file_record;
pub mod ingest_job;
pub mod plan;
pub mod upload;

pub use document::{Chunk, ChunkMetadata};
pub use file_record::{FileRecord, UploadStatus};
pub use ingest_job::{IngestJobRecord, JobCompletion, OutcomeKind};
pub use plan::{PlanTable, PlanTier, SubscriptionPlan};
pub use upload::{UploadCompleteEvent, UploadMetadata};
