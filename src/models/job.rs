use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation id issued to every accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random (v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex characters, used for fallback object names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Final status reported in a callback payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Completed,
    CompletedWithErrors,
    Failed,
}

/// Body of the single-image endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessImageRequest {
    /// Editing instruction
    pub prompt: String,

    /// Correlation hint only; never used as a path.
    #[serde(default)]
    pub filename: Option<String>,

    /// Raw base64, without a `data:` prefix
    pub image_base64: String,
}

/// Body of the batch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchProcessRequest {
    /// Instruction applied to every object under the input prefix
    pub prompt: String,
}

/// Immediate acknowledgement returned with HTTP 202.
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub job_id: JobId,
}

impl AcceptedResponse {
    pub fn new(job_id: JobId) -> Self {
        Self {
            accepted: true,
            job_id,
        }
    }
}

/// A single-image job. Lives only for the duration of its background task.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub prompt: String,
    pub filename: Option<String>,
    pub image_base64: String,
}

impl Job {
    pub fn accept(request: ProcessImageRequest) -> Self {
        Self {
            id: JobId::generate(),
            prompt: request.prompt,
            filename: request.filename,
            image_base64: request.image_base64,
        }
    }
}
