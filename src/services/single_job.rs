use base64::Engine;
use std::sync::Arc;

use crate::error::JobError;
use crate::models::job::{Job, JobStatus};
use crate::models::payload::{ArtifactLocator, CallbackPayload, SingleJobPayload};
use crate::services::callback::CallbackDispatcher;
use crate::services::engine::{EngineFacade, EngineKind};
use crate::services::naming;
use crate::services::sink::ArtifactSink;

/// How a background job ended.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub payload: CallbackPayload,
    pub callback_delivered: bool,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        self.payload.status()
    }
}

/// Runs one image through decode, validate, primary engine, sink, callback.
///
/// There is no fallback engine on this path: callers get primary output or
/// an explicit failure.
pub struct SingleJobOrchestrator {
    engines: Arc<EngineFacade>,
    sink: ArtifactSink,
    callbacks: Arc<CallbackDispatcher>,
}

impl SingleJobOrchestrator {
    pub fn new(
        engines: Arc<EngineFacade>,
        sink: ArtifactSink,
        callbacks: Arc<CallbackDispatcher>,
    ) -> Self {
        Self {
            engines,
            sink,
            callbacks,
        }
    }

    pub async fn run(&self, job: Job, callback_url: &str) -> JobOutcome {
        let payload = match self.execute(&job).await {
            Ok(locator) => {
                tracing::info!(job_id = %job.id, "Single job completed");
                SingleJobPayload::completed(job.id, job.filename, locator)
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error_class = e.class(), error = %e, "Single job failed");
                SingleJobPayload::failed(job.id, job.filename, e.describe())
            }
        };

        let payload = CallbackPayload::from(payload);
        let callback_delivered = self.callbacks.deliver_or_log(callback_url, &payload).await;

        JobOutcome {
            payload,
            callback_delivered,
        }
    }

    async fn execute(&self, job: &Job) -> Result<ArtifactLocator, JobError> {
        let image = base64::engine::general_purpose::STANDARD
            .decode(job.image_base64.trim())
            .map_err(|_| {
                JobError::Validation(
                    "image_base64 is not valid base64 (expected raw base64 without a data: prefix)"
                        .to_string(),
                )
            })?;

        if job.prompt.trim().is_empty() {
            return Err(JobError::Validation("prompt is empty".to_string()));
        }

        let result = self
            .engines
            .process(&image, &job.prompt, EngineKind::Primary)
            .await?;

        let key = naming::make_key(&job.id, job.filename.as_deref(), result.format.extension());
        Ok(self.sink.store(&key, result).await?)
    }
}
