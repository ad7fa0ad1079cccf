//! Ingest job records: the diagnostic side of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored outcome tag of an ingest run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Run has not finished
    Pending,
    Success,
    /// Rejected by the plan's page or size ceiling
    QuotaExceeded,
    /// External system failure (fetch, embedding, index, timeout)
    TransientFailure,
    /// The file itself cannot be ingested
    FatalFailure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::QuotaExceeded => "quota_exceeded",
            Self::TransientFailure => "transient_failure",
            Self::FatalFailure => "fatal_failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "quota_exceeded" => Some(Self::QuotaExceeded),
            "transient_failure" => Some(Self::TransientFailure),
            "fatal_failure" => Some(Self::FatalFailure),
            _ => None,
        }
    }
}

/// One row per storage key, created together with the file record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobRecord {
    pub storage_key: String,
    pub file_id: Uuid,
    pub outcome: OutcomeKind,
    /// Failure or rejection reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors_indexed: Option<u32>,
    /// SHA-256 of the fetched bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Values written when a run finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobCompletion {
    pub reason: Option<String>,
    pub page_count: Option<u32>,
    pub vectors_indexed: Option<u32>,
    pub content_hash: Option<String>,
}
