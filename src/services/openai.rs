use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EngineSettings;
use crate::services::engine::{
    EngineError, ImageEngine, OutputFormat, ProcessingResult, QuotaClassifier,
};

/// Primary engine: OpenAI-compatible image edits endpoint.
pub struct OpenAiImageClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    quality: String,
    output_format: OutputFormat,
    classifier: QuotaClassifier,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(settings: EngineSettings, classifier: QuotaClassifier) -> Result<Self, EngineError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/images/edits", settings.api_base),
            api_key: settings.api_key,
            model: settings.model,
            quality: settings.quality,
            output_format: settings.output_format,
            classifier,
        })
    }
}

#[async_trait]
impl ImageEngine for OpenAiImageClient {
    async fn edit(&self, image: &[u8], prompt: &str) -> Result<ProcessingResult, EngineError> {
        let image_part = Part::bytes(image.to_vec())
            .file_name("input.png")
            .mime_str("image/png")
            .map_err(|e| EngineError::Unavailable(format!("invalid image part: {e}")))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string())
            .text("quality", self.quality.clone())
            .text("output_format", self.output_format.to_string())
            .part("image", image_part);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classifier.classify(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read error body: {e}>"));
            tracing::warn!(status = status.as_u16(), "Primary engine returned an error");
            return Err(self.classifier.classify(format!("{status}: {body}")));
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Unavailable(format!("invalid engine response: {e}")))?;

        let b64 = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| EngineError::Unavailable("engine returned empty b64_json".to_string()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| EngineError::Unavailable(format!("engine returned invalid base64: {e}")))?;

        Ok(ProcessingResult::new(bytes, self.output_format))
    }
}
