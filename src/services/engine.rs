use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use strum::{Display, EnumString};

use crate::config::ConfigError;

/// Normalized output format token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }
}

/// Output of an engine call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub format: OutputFormat,
}

impl ProcessingResult {
    pub fn new(bytes: Vec<u8>, format: OutputFormat) -> Self {
        Self {
            bytes,
            mime_type: format.mime_type().to_string(),
            format,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineKind {
    /// Quota-limited external engine
    Primary,
    /// Always-available local degraded engine
    Fallback,
}

/// An image editing capability.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    async fn edit(&self, image: &[u8], prompt: &str) -> Result<ProcessingResult, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Config(String),

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("{0}")]
    Quota(String),

    #[error("{0}")]
    Unavailable(String),
}

impl EngineError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Config(_) => "EngineConfigError",
            Self::EmptyPrompt => "EmptyPromptError",
            Self::Quota(_) => "EngineQuotaError",
            Self::Unavailable(_) => "EngineUnavailableError",
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota(_))
    }
}

/// Decides whether a primary engine failure means the quota is exhausted.
///
/// Matching is a plain substring search over the configured signatures, so
/// the exact wording can be changed without touching the engine client.
#[derive(Debug, Clone)]
pub struct QuotaClassifier {
    signatures: Vec<String>,
}

impl QuotaClassifier {
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures }
    }

    pub fn is_quota(&self, message: &str) -> bool {
        self.signatures
            .iter()
            .any(|sig| !sig.is_empty() && message.contains(sig.as_str()))
    }

    /// Classify a failure message from the primary engine.
    pub fn classify(&self, message: String) -> EngineError {
        if self.is_quota(&message) {
            EngineError::Quota(message)
        } else {
            EngineError::Unavailable(message)
        }
    }
}

/// Front door to the primary and fallback engines.
///
/// The facade never falls back on its own; callers pick the engine.
pub struct EngineFacade {
    primary: Result<Arc<dyn ImageEngine>, ConfigError>,
    fallback: Arc<dyn ImageEngine>,
}

impl EngineFacade {
    pub fn new(
        primary: Result<Arc<dyn ImageEngine>, ConfigError>,
        fallback: Arc<dyn ImageEngine>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Fails when the primary engine is not configured.
    pub fn require_primary(&self) -> Result<(), ConfigError> {
        self.primary.as_ref().map(|_| ()).map_err(|e| e.clone())
    }

    pub async fn process(
        &self,
        image: &[u8],
        prompt: &str,
        kind: EngineKind,
    ) -> Result<ProcessingResult, EngineError> {
        let engine = match kind {
            EngineKind::Primary => self
                .primary
                .as_ref()
                .map_err(|e| EngineError::Config(e.to_string()))?,
            EngineKind::Fallback => &self.fallback,
        };

        if prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt);
        }

        tracing::debug!(engine = %kind, input_bytes = image.len(), "Invoking image engine");
        engine.edit(image, prompt).await
    }
}
