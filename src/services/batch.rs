use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{BatchSettings, ConfigError};
use crate::error::JobError;
use crate::models::batch::{BatchRun, ObjectOutcome};
use crate::models::job::{JobId, JobStatus};
use crate::models::payload::CallbackPayload;
use crate::services::callback::CallbackDispatcher;
use crate::services::engine::{EngineFacade, EngineKind, ProcessingResult};
use crate::services::naming;
use crate::services::single_job::JobOutcome;
use crate::services::storage::ObjectStore;

/// Applies one prompt to every object under the input prefix and sends a
/// single callback with the aggregate.
pub struct BatchOrchestrator {
    engines: Arc<EngineFacade>,
    store: Arc<dyn ObjectStore>,
    callbacks: Arc<CallbackDispatcher>,
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(
        engines: Arc<EngineFacade>,
        store: Arc<dyn ObjectStore>,
        callbacks: Arc<CallbackDispatcher>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            engines,
            store,
            callbacks,
            settings,
        }
    }

    pub async fn run(&self, job_id: JobId, prompt: &str, callback_url: &str) -> JobOutcome {
        let started = Instant::now();

        let (run, status, error) = match self.enumerate(prompt).await {
            Ok((input_bucket, keys)) => {
                tracing::info!(job_id = %job_id, total_files = keys.len(), "Batch enumeration complete");
                let run = self.process_all(job_id, prompt, input_bucket, keys).await;
                let status = run.status();
                (run, status, None)
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Batch could not start");
                (BatchRun::default(), JobStatus::Failed, Some(e.describe()))
            }
        };

        tracing::info!(
            job_id = %job_id,
            status = %status,
            total_files = run.total_files,
            processed = run.processed,
            failed = run.failed,
            fallback_local = run.fallback_local,
            "Batch finished"
        );

        let payload = CallbackPayload::from(run.into_payload(
            job_id,
            status,
            error,
            started.elapsed(),
            &self.settings.output_bucket,
            &self.settings.output_prefix,
        ));
        let callback_delivered = self.callbacks.deliver_or_log(callback_url, &payload).await;

        JobOutcome {
            payload,
            callback_delivered,
        }
    }

    /// Preconditions, then the full key listing.
    async fn enumerate(&self, prompt: &str) -> Result<(&str, Vec<String>), JobError> {
        let input_bucket = self
            .settings
            .input_bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(ConfigError::MissingInputBucket)?;

        if prompt.trim().is_empty() {
            return Err(JobError::Validation("prompt is empty".to_string()));
        }

        let keys = self
            .store
            .list(input_bucket, &self.settings.input_prefix)
            .await?;
        Ok((input_bucket, keys))
    }

    async fn process_all(
        &self,
        job_id: JobId,
        prompt: &str,
        input_bucket: &str,
        keys: Vec<String>,
    ) -> BatchRun {
        let mut run = BatchRun::new(keys.len());

        // Outcomes come back in input order and are folded here, so the
        // counters are only ever touched by this task.
        let outcomes: Vec<(String, ObjectOutcome)> = stream::iter(keys)
            .map(|key| async move {
                let outcome = self.process_object(job_id, prompt, input_bucket, &key).await;
                (key, outcome)
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (key, outcome) in outcomes {
            run.record(&key, outcome);
        }
        run
    }

    async fn process_object(
        &self,
        job_id: JobId,
        prompt: &str,
        input_bucket: &str,
        key: &str,
    ) -> ObjectOutcome {
        let image = match self.store.get(input_bucket, key).await {
            Ok(bytes) => bytes,
            Err(e) => return failed(JobError::from(e).describe()),
        };

        let (result, fallback) = match self.edit_with_fallback(&image, prompt, key).await {
            Ok(done) => done,
            Err(error) => return failed(error),
        };

        let output_key = naming::make_batch_key(
            &self.settings.output_prefix,
            &job_id,
            key,
            result.format.extension(),
        );

        match self
            .store
            .put(
                &self.settings.output_bucket,
                &output_key,
                &result.bytes,
                &result.mime_type,
            )
            .await
        {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, input = %key, output = %output_key, fallback, "Batch object stored");
                ObjectOutcome::Processed {
                    output_key,
                    fallback,
                }
            }
            Err(e) => failed(format!("upload failed: {}", JobError::from(e).describe())),
        }
    }

    /// Primary engine first; a quota failure retries this one object on the
    /// fallback engine. Returns the result and whether the fallback produced it.
    async fn edit_with_fallback(
        &self,
        image: &[u8],
        prompt: &str,
        key: &str,
    ) -> Result<(ProcessingResult, bool), String> {
        match self.engines.process(image, prompt, EngineKind::Primary).await {
            Ok(result) => Ok((result, false)),
            Err(e) if e.is_quota() => {
                tracing::warn!(input = %key, "Primary engine quota exhausted, using fallback engine");
                metrics::counter!("image_engine_fallback_total").increment(1);

                self.engines
                    .process(image, prompt, EngineKind::Fallback)
                    .await
                    .map(|result| (result, true))
                    .map_err(|e2| {
                        format!("fallback engine failed: {}", JobError::from(e2).describe())
                    })
            }
            Err(e) => Err(JobError::from(e).describe()),
        }
    }
}

fn failed(error: String) -> ObjectOutcome {
    ObjectOutcome::Failed { error }
}
