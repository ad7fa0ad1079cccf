//! pdfchat-ingest: upload-completion ingestion for a PDF chat service
//!
//! When an upload finishes, the pipeline records the file as PROCESSING, fetches
//! and parses the PDF, enforces the plan's page ceiling, embeds each page and
//! upserts the vectors into a namespaced index, then marks the record SUCCESS or
//! FAILED. Deliveries are idempotent per storage key.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use processing::{IngestOutcome, IngestPipeline, IngestReport};
pub use types::{FileRecord, UploadCompleteEvent, UploadStatus};
