use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::services::{
    callback::CallbackDispatcher,
    engine::{EngineFacade, ImageEngine, QuotaClassifier},
    fallback::LocalFallbackEngine,
    openai::OpenAiImageClient,
    storage::{ObjectStore, S3Store},
};

/// Shared application state passed to all route handlers.
///
/// Collaborators whose configuration is missing are kept as the error, so
/// each endpoint can report exactly what it lacks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engines: Arc<EngineFacade>,
    pub storage: Result<Arc<dyn ObjectStore>, ConfigError>,
    pub callbacks: Arc<CallbackDispatcher>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        engines: EngineFacade,
        storage: Result<Arc<dyn ObjectStore>, ConfigError>,
        callbacks: CallbackDispatcher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engines: Arc::new(engines),
            storage,
            callbacks: Arc::new(callbacks),
        }
    }

    /// Build the production collaborators from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, ConfigError> {
        let classifier = QuotaClassifier::new(config.quota_error_signatures.clone());

        let primary = config.engine_settings().and_then(|settings| {
            OpenAiImageClient::new(settings, classifier)
                .map(|client| Arc::new(client) as Arc<dyn ImageEngine>)
                .map_err(|e| ConfigError::Invalid(e.to_string()))
        });
        if let Err(e) = &primary {
            tracing::warn!(error = %e, "Primary image engine not configured");
        }

        let storage = config.storage_settings().and_then(|settings| {
            S3Store::new(&settings)
                .map(|store| Arc::new(store) as Arc<dyn ObjectStore>)
                .map_err(|e| ConfigError::Invalid(e.to_string()))
        });
        if let Err(e) = &storage {
            tracing::warn!(error = %e, "Object storage not configured");
        }

        let callbacks = CallbackDispatcher::new(&config.callback_settings())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let engines = EngineFacade::new(primary, Arc::new(LocalFallbackEngine::new()));

        Ok(Self::new(config, engines, storage, callbacks))
    }

    pub fn storage(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        self.storage.clone()
    }
}
