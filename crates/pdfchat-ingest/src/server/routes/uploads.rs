//! Upload-completion trigger endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::UploadCompleteEvent;

/// Response once the event is queued
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub storage_key: String,
}

/// POST /api/uploads/complete - Queue an upload for ingestion
///
/// Processing happens in the background; poll `/api/files/by-key/:key` for the status.
pub async fn upload_complete(
    State(state): State<AppState>,
    Json(event): Json<UploadCompleteEvent>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let storage_key = event.storage_key.clone();
    tracing::info!(
        "[{}] Upload complete for user {}: '{}'",
        storage_key,
        event.metadata.user_id,
        event.display_name
    );

    state.job_queue().submit(event).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            storage_key,
        }),
    ))
}
