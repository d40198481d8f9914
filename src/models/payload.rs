use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::{JobId, JobStatus};

/// Where the result of a single-image job can be found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArtifactLocator {
    /// Result echoed back as base64, nothing stored.
    Inline {
        result_image_base64: String,
        result_mime_type: String,
    },
    /// Result uploaded to object storage with a time-limited retrieval URL.
    Stored {
        object_key: String,
        result_url: String,
        expires_in: u32,
        expires_at: DateTime<Utc>,
    },
}

/// Callback body for the single-image endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SingleJobPayload {
    pub status: JobStatus,
    pub job_id: JobId,
    pub filename: Option<String>,
    #[serde(flatten)]
    pub locator: Option<ArtifactLocator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SingleJobPayload {
    pub fn completed(job_id: JobId, filename: Option<String>, locator: ArtifactLocator) -> Self {
        Self {
            status: JobStatus::Completed,
            job_id,
            filename,
            locator: Some(locator),
            error: None,
        }
    }

    pub fn failed(job_id: JobId, filename: Option<String>, error: String) -> Self {
        Self {
            status: JobStatus::Failed,
            job_id,
            filename,
            locator: None,
            error: Some(error),
        }
    }
}

/// Callback body for a batch run. One per run, never per object.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPayload {
    pub status: JobStatus,
    pub job_id: JobId,
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    pub fallback_local: usize,
    pub duration_seconds: f64,
    pub avg_seconds_per_file: Option<f64>,
    /// Objects with an uploaded result, fallback output included. Equal to
    /// `processed`; fallback objects are not counted a second time.
    pub total_files_processed: usize,
    pub output_bucket: String,
    pub output_prefix: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CallbackPayload {
    Single(SingleJobPayload),
    Batch(BatchPayload),
}

impl CallbackPayload {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Single(p) => p.status,
            Self::Batch(p) => p.status,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Self::Single(p) => p.job_id,
            Self::Batch(p) => p.job_id,
        }
    }
}

impl From<SingleJobPayload> for CallbackPayload {
    fn from(payload: SingleJobPayload) -> Self {
        Self::Single(payload)
    }
}

impl From<BatchPayload> for CallbackPayload {
    fn from(payload: BatchPayload) -> Self {
        Self::Batch(payload)
    }
}
