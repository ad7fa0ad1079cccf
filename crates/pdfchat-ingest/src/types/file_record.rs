//! File record types for tracking upload processing status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload status polled by the UI
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    /// Record created, ingestion still running
    Processing,
    /// Every chunk of the document was embedded and indexed
    Success,
    /// Rejected by quota or failed somewhere in the pipeline
    Failed,
}

impl UploadStatus {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parse the stored string form
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PROCESSING" => Some(Self::Processing),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// SUCCESS and FAILED never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Only PROCESSING -> terminal is allowed
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        *self == Self::Processing && next.is_terminal()
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded document, keyed by its storage key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// System generated identifier, also the `documentId` on indexed vectors
    pub id: Uuid,
    /// Storage-system key (unique)
    pub key: String,
    /// Display name
    pub name: String,
    /// Owning user
    pub user_id: String,
    /// Source URL the file was fetched from
    pub url: String,
    /// Current status
    pub upload_status: UploadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a new record in the PROCESSING state
    pub fn processing(key: String, name: String, user_id: String, url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            name,
            user_id,
            url,
            upload_status: UploadStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }
}
