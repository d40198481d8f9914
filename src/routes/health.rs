use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: String,
}

/// GET /health: liveness only, no dependency checks.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Non-secret storage settings.
#[derive(Serialize)]
pub struct StorageConfigResponse {
    pub endpoint: String,
    pub region: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub input_prefix: String,
    pub output_prefix: String,
    pub presign_expires: u32,
}

/// GET /cos/config: echo of the storage configuration, credentials excluded.
pub async fn storage_config(State(state): State<AppState>) -> Json<StorageConfigResponse> {
    let config = &state.config;
    Json(StorageConfigResponse {
        endpoint: config.cos_endpoint.clone(),
        region: config.cos_region.clone(),
        input_bucket: config.cos_input_bucket.clone(),
        output_bucket: config.output_bucket().to_string(),
        input_prefix: config.cos_input_prefix.clone(),
        output_prefix: config.cos_output_prefix.clone(),
        presign_expires: config.cos_presign_expires,
    })
}
