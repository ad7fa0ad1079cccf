//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for file records, ingest jobs and local vectors.

mod database;

pub use database::{FileStats, IngestDb};
