//! HTTP server for the ingestion service

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Ingestion HTTP server
pub struct IngestServer {
    config: IngestConfig,
    state: AppState,
}

impl IngestServer {
    /// Create a server, opening the database and starting the worker
    pub async fn new(config: IngestConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create around an existing state
    pub fn from_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            // Middleware layers (applied bottom to top)
            .layer(RequestBodyLimitLayer::new(self.config.server.max_body_size))
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting ingestion server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::IngestPipeline;
    use crate::storage::IngestDb;
    use crate::testing::{pdf_with_pages, MemoryIndex, StaticFetcher, StubEmbedder};
    use crate::types::{FileRecord, IngestJobRecord, UploadStatus};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const URL: &str = "https://files.example/f/report";

    fn test_server() -> (IngestServer, Arc<IngestDb>) {
        let mut config = IngestConfig::default();
        config.embeddings.dimensions = 4;

        let db = Arc::new(IngestDb::in_memory().unwrap());
        let pipeline = Arc::new(IngestPipeline::new(
            &config,
            db.clone(),
            Arc::new(StaticFetcher::new().with_body(URL, pdf_with_pages(2))),
            Arc::new(StubEmbedder::new(4)),
            Arc::new(MemoryIndex::new()),
        ));
        let state = AppState::assemble(config, db.clone(), pipeline, "stub", "memory");
        state.set_ready(true);
        (IngestServer::from_state(state), db)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn trigger(key: &str) -> Request<Body> {
        let body = json!({
            "storageKey": key,
            "displayName": "report.pdf",
            "fileUrl": URL,
            "metadata": {
                "userId": "user_7",
                "subscriptionPlan": { "isActive": false }
            }
        });
        Request::post("/api/uploads/complete")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (server, _) = test_server();
        let router = server.build_router();

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_trigger_accepted_then_file_pollable() {
        let (server, db) = test_server();
        let router = server.build_router();

        let response = router.clone().oneshot(trigger("up-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["accepted"], true);
        assert_eq!(body["storageKey"], "up-1");

        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(record) = db.get_by_key("up-1").unwrap() {
                    if record.upload_status.is_terminal() {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let response = router
            .clone()
            .oneshot(Request::get("/api/files/by-key/up-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record: FileRecord = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(record.upload_status, UploadStatus::Success);
        assert_eq!(record.user_id, "user_7");

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/api/files/{}/ingest", record.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let job: IngestJobRecord = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(job.vectors_indexed, Some(2));

        let response = router
            .oneshot(Request::get("/api/files?userId=user_7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["files"][0]["uploadStatus"], "SUCCESS");
    }

    #[tokio::test]
    async fn test_malformed_trigger_rejected() {
        let (server, db) = test_server();
        let request = Request::post("/api/uploads/complete")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"storageKey": "x"}"#))
            .unwrap();

        let response = server.build_router().oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(db.count_by_key("x").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_file_is_404() {
        let (server, _) = test_server();
        let response = server
            .build_router()
            .oneshot(
                Request::get(format!("/api/files/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_jobs_reports_queue_and_file_counts() {
        let (server, _) = test_server();
        let response = server
            .build_router()
            .oneshot(Request::get("/api/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["queue"]["accepted"], 0);
        assert_eq!(body["files"]["total"], 0);
        assert!(body["inFlight"].as_array().unwrap().is_empty());
    }
}
