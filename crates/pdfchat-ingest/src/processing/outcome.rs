//! Result of one ingest run and its projection onto the stored status

use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::types::{OutcomeKind, UploadStatus};

/// How a run that got past record creation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Every chunk was embedded and indexed
    Success,
    /// Document exceeds the plan's page or size ceiling
    QuotaExceeded(String),
    /// An external system failed; a new upload may succeed
    TransientFailure(String),
    /// The file itself cannot be ingested
    FatalFailure(String),
}

impl IngestOutcome {
    /// Classify a pipeline error
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::FileTooLarge { .. } => Self::QuotaExceeded(err.to_string()),
            e if e.is_transient() => Self::TransientFailure(e.to_string()),
            e => Self::FatalFailure(e.to_string()),
        }
    }

    /// Status written to the file record
    pub fn upload_status(&self) -> UploadStatus {
        match self {
            Self::Success => UploadStatus::Success,
            _ => UploadStatus::Failed,
        }
    }

    /// Tag written to the ingest job record
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success => OutcomeKind::Success,
            Self::QuotaExceeded(_) => OutcomeKind::QuotaExceeded,
            Self::TransientFailure(_) => OutcomeKind::TransientFailure,
            Self::FatalFailure(_) => OutcomeKind::FatalFailure,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::QuotaExceeded(r) | Self::TransientFailure(r) | Self::FatalFailure(r) => Some(r),
        }
    }
}

/// What the pipeline did with one trigger event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestReport {
    /// A record already existed for the key; nothing was touched
    Duplicate { storage_key: String },
    /// The run finished with `outcome`
    Completed {
        file_id: Uuid,
        outcome: IngestOutcome,
        page_count: Option<u32>,
        vectors_indexed: u32,
        /// False when the final status write failed and the record is stuck in PROCESSING
        status_recorded: bool,
    },
    /// The PROCESSING record could not be created
    NotStarted { storage_key: String, reason: String },
}

impl IngestReport {
    pub fn outcome(&self) -> Option<&IngestOutcome> {
        match self {
            Self::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
