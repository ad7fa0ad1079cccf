//! API routes for the ingestion server

pub mod files;
pub mod jobs;
pub mod uploads;

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Upload-completion trigger
        .route("/uploads/complete", post(uploads::upload_complete))
        // File status for UI polling
        .route("/files", get(files::list_files))
        .route("/files/by-key/:key", get(files::get_file_by_key))
        .route("/files/:id", get(files::get_file))
        .route("/files/:id/ingest", get(files::get_ingest_job))
        // Queue statistics
        .route("/jobs", get(jobs::list_jobs))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    Json(json!({
        "name": "pdfchat-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upload-completion ingestion: fetch, parse, quota-check, embed and index PDFs",
        "backend": config.backend,
        "embedder": state.embedder_name(),
        "vectorIndex": state.index_name(),
        "namespace": config.vector_index.namespace,
        "chunking": config.chunking.mode,
        "plans": config.plans.tiers,
        "endpoints": {
            "POST /api/uploads/complete": "Accept an upload-completion event for background ingestion",
            "GET /api/files?userId=": "List a user's files, newest first",
            "GET /api/files/:id": "File record with upload status",
            "GET /api/files/by-key/:key": "File record by storage key",
            "GET /api/files/:id/ingest": "Ingest job details (outcome, reason, counts)",
            "GET /api/jobs": "Queue statistics and in-flight keys"
        }
    }))
}
