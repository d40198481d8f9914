use std::time::Duration;

use super::job::{JobId, JobStatus};
use super::payload::BatchPayload;

/// Maximum number of per-object error strings carried in a batch callback.
pub const MAX_REPORTED_ERRORS: usize = 20;

/// Result of one object inside a batch run.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOutcome {
    /// Uploaded under `output_key`; `fallback` marks degraded-engine output.
    Processed { output_key: String, fallback: bool },
    Failed { error: String },
}

/// Aggregate counters for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    pub fallback_local: usize,
    pub errors: Vec<String>,
}

impl BatchRun {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn record(&mut self, input_key: &str, outcome: ObjectOutcome) {
        match outcome {
            ObjectOutcome::Processed { fallback, .. } => {
                self.processed += 1;
                if fallback {
                    self.fallback_local += 1;
                    self.push_error(format!(
                        "{input_key}: primary engine quota exhausted -> fallback applied"
                    ));
                }
            }
            ObjectOutcome::Failed { error } => {
                self.failed += 1;
                self.push_error(format!("{input_key}: {error}"));
            }
        }
    }

    fn push_error(&mut self, error: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error);
        }
    }

    /// `completed` when nothing failed, `completed_with_errors` otherwise.
    pub fn status(&self) -> JobStatus {
        if self.failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::CompletedWithErrors
        }
    }

    pub fn into_payload(
        self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
        elapsed: Duration,
        output_bucket: &str,
        output_prefix: &str,
    ) -> BatchPayload {
        let duration_seconds = round_millis(elapsed.as_secs_f64());
        let avg_seconds_per_file = (self.total_files > 0)
            .then(|| round_millis(duration_seconds / self.total_files as f64));

        BatchPayload {
            status,
            job_id,
            total_files: self.total_files,
            processed: self.processed,
            failed: self.failed,
            fallback_local: self.fallback_local,
            duration_seconds,
            avg_seconds_per_file,
            total_files_processed: self.processed,
            output_bucket: output_bucket.to_string(),
            output_prefix: format!("{}/{}/", output_prefix.trim_end_matches('/'), job_id),
            errors: self.errors,
            error,
        }
    }
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
