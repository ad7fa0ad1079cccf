//! Queue statistics endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::Result;
use crate::processing::{InFlightJob, QueueStats};
use crate::server::state::AppState;
use crate::storage::FileStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsResponse {
    pub queue: QueueStats,
    pub in_flight: Vec<InFlightJob>,
    pub files: FileStats,
}

/// GET /api/jobs - Queue statistics, in-flight keys and record counts
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<JobsResponse>> {
    let queue = state.job_queue();
    Ok(Json(JobsResponse {
        queue: queue.stats(),
        in_flight: queue.in_flight(),
        files: state.db().get_stats()?,
    }))
}
