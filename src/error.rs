use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::services::engine::EngineError;
use crate::services::storage::StorageError;

/// Failure inside a background job, reported through the callback.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JobError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Config(_) => "ConfigurationError",
            Self::Engine(e) => e.class(),
            Self::Storage(e) => e.class(),
        }
    }

    /// `"<ErrorClass>: <message>"`, as carried in callback payloads.
    pub fn describe(&self) -> String {
        format!("{}: {}", self.class(), self)
    }
}

/// Synchronous failure of an acceptance endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Missing required header: callbackUrl")]
    MissingCallbackUrl,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingCallbackUrl => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
