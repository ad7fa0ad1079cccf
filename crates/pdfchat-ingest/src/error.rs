//! Error types for the ingestion service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetching the uploaded file failed
    #[error("Failed to fetch '{url}': {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Download exceeds the plan's size limit
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Content is not something the pipeline can ingest
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// Embedding error, with the provider's HTTP status when it answered
    #[error("Embedding generation failed: {message}")]
    Embedding { status: Option<u16>, message: String },

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Relational database error
    #[error("Database error: {0}")]
    Database(String),

    /// A pipeline stage exceeded its time budget
    #[error("Timed out during {stage} after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a fetch error for a non-success HTTP status
    pub fn fetch_status(url: impl Into<String>, status: u16) -> Self {
        Self::Fetch {
            url: url.into(),
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    /// Create a fetch error without a status (connection or body read failure)
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error without a status (connection failure or bad payload)
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            status: None,
            message: message.into(),
        }
    }

    /// Create an embedding error for a non-success HTTP status
    pub fn embedding_status(status: u16, message: impl Into<String>) -> Self {
        Self::Embedding {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure came from an external system that may succeed on a later upload.
    ///
    /// Parse failures and unsupported content are properties of the file itself
    /// and are reported as fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Fetch { status, .. } | Error::Embedding { status, .. } => {
                !matches!(status, Some(s) if !is_retryable_status(*s))
            }
            Error::VectorIndex(_)
            | Error::Database(_)
            | Error::Timeout { .. }
            | Error::Io(_)
            | Error::Http(_) => true,
            Error::Config(_)
            | Error::FileTooLarge { .. }
            | Error::FileParse { .. }
            | Error::UnsupportedContent(_)
            | Error::NotFound(_)
            | Error::Json(_)
            | Error::Internal(_) => false,
        }
    }
}

/// Rate limiting and server errors; any other 4xx is a problem with the request itself
fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch_error"),
            Error::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "file_too_large"),
            Error::FileParse { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "parse_error"),
            Error::UnsupportedContent(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_content"),
            Error::Embedding { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::VectorIndex(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_index_error"),
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
