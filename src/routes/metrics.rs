use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the metrics emitted by jobs and callbacks.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "image_jobs_accepted_total",
        "Jobs accepted by the acceptance endpoints, by kind"
    );
    metrics::describe_counter!(
        "image_jobs_finished_total",
        "Background jobs that reached a terminal status, by kind and status"
    );
    metrics::describe_histogram!(
        "image_job_duration_seconds",
        "Wall time of a background job including its callback"
    );
    metrics::describe_counter!(
        "image_engine_fallback_total",
        "Batch objects retried on the fallback engine after a quota error"
    );
    metrics::describe_counter!(
        "callback_deliveries_total",
        "Callback delivery attempts, by outcome"
    );
}

/// GET /metrics: Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
