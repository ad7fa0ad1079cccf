//! File status endpoints polled by the UI

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{FileRecord, IngestJobRecord};

/// Query parameters for listing files
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub user_id: String,
}

/// Response for file list
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub total: usize,
}

/// GET /api/files?userId= - A user's files, newest first
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>> {
    let files = state.db().list_for_user(&query.user_id)?;
    Ok(Json(FileListResponse {
        total: files.len(),
        files,
    }))
}

/// GET /api/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileRecord>> {
    state
        .db()
        .get_by_id(id)?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("File {} not found", id)))
}

/// GET /api/files/by-key/:key
pub async fn get_file_by_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<FileRecord>> {
    state
        .db()
        .get_by_key(&key)?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("No file with key {}", key)))
}

/// GET /api/files/:id/ingest - Outcome detail the two-value status cannot carry
pub async fn get_ingest_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngestJobRecord>> {
    state
        .db()
        .get_ingest_job(id)?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("No ingest job for file {}", id)))
}
