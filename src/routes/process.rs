use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::future::Future;
use std::time::Instant;
use tracing::Instrument;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::{AcceptedResponse, BatchProcessRequest, Job, JobId, ProcessImageRequest};
use crate::services::batch::BatchOrchestrator;
use crate::services::single_job::{JobOutcome, SingleJobOrchestrator};
use crate::services::sink::ArtifactSink;

/// Header carrying the caller's webhook URL.
pub const CALLBACK_HEADER: &str = "callbackurl";

type Accepted = (StatusCode, Json<AcceptedResponse>);

/// POST /process-image-async: edit one image, store it, call back with a presigned URL.
pub async fn process_image_async(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProcessImageRequest>,
) -> Result<Accepted, ApiError> {
    let callback_url = callback_url(&headers)?;
    let store = state.storage()?;
    state.engines.require_primary()?;

    let sink = ArtifactSink::stored(
        store,
        state.config.output_bucket(),
        state.config.cos_presign_expires,
    );
    Ok(accept_single(&state, sink, body, callback_url))
}

/// POST /process-image-async-b64: edit one image, call back with it inline.
pub async fn process_image_async_b64(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProcessImageRequest>,
) -> Result<Accepted, ApiError> {
    let callback_url = callback_url(&headers)?;
    state.engines.require_primary()?;

    Ok(accept_single(&state, ArtifactSink::Inline, body, callback_url))
}

/// POST /batch-process-images: edit every object under the input prefix.
pub async fn batch_process_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BatchProcessRequest>,
) -> Result<Accepted, ApiError> {
    let callback_url = callback_url(&headers)?;
    let store = state.storage()?;
    state.engines.require_primary()?;
    state.config.require_input_bucket()?;

    let job_id = JobId::generate();
    let orchestrator = BatchOrchestrator::new(
        state.engines.clone(),
        store,
        state.callbacks.clone(),
        state.config.batch_settings(),
    );

    spawn_job("batch", job_id, async move {
        orchestrator.run(job_id, &body.prompt, &callback_url).await
    });

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::new(job_id))))
}

fn accept_single(
    state: &AppState,
    sink: ArtifactSink,
    body: ProcessImageRequest,
    callback_url: String,
) -> Accepted {
    let kind = match &sink {
        ArtifactSink::Inline => "single_inline",
        ArtifactSink::Stored { .. } => "single_stored",
    };
    let job = Job::accept(body);
    let job_id = job.id;
    let orchestrator =
        SingleJobOrchestrator::new(state.engines.clone(), sink, state.callbacks.clone());

    spawn_job(kind, job_id, async move {
        orchestrator.run(job, &callback_url).await
    });

    (StatusCode::ACCEPTED, Json(AcceptedResponse::new(job_id)))
}

fn callback_url(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(CALLBACK_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingCallbackUrl)
}

/// Run a job in the background; the caller never awaits it.
fn spawn_job<F>(kind: &'static str, job_id: JobId, job: F)
where
    F: Future<Output = JobOutcome> + Send + 'static,
{
    metrics::counter!("image_jobs_accepted_total", "kind" => kind).increment(1);
    tracing::info!(job_id = %job_id, kind, "Job accepted");

    let span = tracing::info_span!("job", job_id = %job_id, kind);
    tokio::spawn(
        async move {
            let started = Instant::now();
            let outcome = job.await;

            metrics::histogram!("image_job_duration_seconds", "kind" => kind)
                .record(started.elapsed().as_secs_f64());
            metrics::counter!(
                "image_jobs_finished_total",
                "kind" => kind,
                "status" => outcome.status().to_string()
            )
            .increment(1);
        }
        .instrument(span),
    );
}
