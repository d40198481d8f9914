use serde::Deserialize;
use std::time::Duration;

use crate::services::engine::OutputFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// S3-compatible object storage endpoint URL
    #[serde(default)]
    pub cos_endpoint: String,

    /// Signing region for the storage endpoint
    #[serde(default = "default_cos_region")]
    pub cos_region: String,

    #[serde(default)]
    pub cos_access_key_id: String,

    #[serde(default)]
    pub cos_secret_access_key: String,

    /// Legacy single-bucket setting, used when `cos_output_bucket` is unset.
    #[serde(default)]
    pub cos_bucket: String,

    #[serde(default)]
    pub cos_output_bucket: String,

    /// Bucket enumerated by batch runs
    #[serde(default)]
    pub cos_input_bucket: String,

    #[serde(default)]
    pub cos_input_prefix: String,

    #[serde(default = "default_output_prefix")]
    pub cos_output_prefix: String,

    /// Presigned URL lifetime in seconds
    #[serde(default = "default_presign_expires")]
    pub cos_presign_expires: u32,

    /// Primary engine API key
    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,

    #[serde(default = "default_openai_image_model")]
    pub openai_image_model: String,

    /// low | medium | high | auto
    #[serde(default = "default_openai_image_quality")]
    pub openai_image_quality: String,

    /// png | jpeg | webp
    #[serde(default = "default_openai_image_output_format")]
    pub openai_image_output_format: String,

    #[serde(default = "default_openai_timeout_secs")]
    pub openai_timeout_secs: u64,

    /// Substrings identifying a quota/billing exhaustion in primary engine errors
    #[serde(default = "default_quota_error_signatures")]
    pub quota_error_signatures: Vec<String>,

    /// Callback host that is unreachable from this process
    #[serde(default = "default_callback_internal_host")]
    pub callback_internal_host: String,

    #[serde(default = "default_callback_internal_port")]
    pub callback_internal_port: u16,

    /// Replacement host:port for internal callback URLs. Empty disables rewriting.
    #[serde(default = "default_callback_tunnel_netloc")]
    pub callback_tunnel_netloc: String,

    #[serde(default = "default_callback_connect_timeout_secs")]
    pub callback_connect_timeout_secs: u64,

    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    /// Number of batch objects processed concurrently
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cos_region() -> String {
    "eu-geo".to_string()
}

fn default_output_prefix() -> String {
    "results/batch".to_string()
}

fn default_presign_expires() -> u32 {
    900
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_openai_image_quality() -> String {
    "medium".to_string()
}

fn default_openai_image_output_format() -> String {
    "png".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    120
}

fn default_quota_error_signatures() -> Vec<String> {
    vec![
        "billing_hard_limit_reached".to_string(),
        "Billing hard limit has been reached".to_string(),
    ]
}

fn default_callback_internal_host() -> String {
    "wxo-server".to_string()
}

fn default_callback_internal_port() -> u16 {
    4321
}

fn default_callback_tunnel_netloc() -> String {
    "127.0.0.1:14321".to_string()
}

fn default_callback_connect_timeout_secs() -> u64 {
    10
}

fn default_callback_timeout_secs() -> u64 {
    60
}

fn default_batch_concurrency() -> usize {
    1
}

fn default_max_body_bytes() -> usize {
    25 * 1024 * 1024
}

/// Credentials and endpoint for the S3-compatible object store.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Settings for the primary image editing engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub quality: String,
    pub output_format: OutputFormat,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CallbackSettings {
    pub internal_host: String,
    pub internal_port: u16,
    pub tunnel_netloc: Option<String>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

/// Where batch runs read from and write to.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub input_bucket: Option<String>,
    pub input_prefix: String,
    pub output_bucket: String,
    pub output_prefix: String,
    pub concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>().map(Self::normalized)
    }

    fn normalized(mut self) -> Self {
        for value in [
            &mut self.cos_endpoint,
            &mut self.cos_region,
            &mut self.cos_access_key_id,
            &mut self.cos_secret_access_key,
            &mut self.cos_bucket,
            &mut self.cos_output_bucket,
            &mut self.cos_input_bucket,
            &mut self.cos_input_prefix,
            &mut self.cos_output_prefix,
            &mut self.openai_api_key,
            &mut self.openai_api_base,
            &mut self.openai_image_model,
            &mut self.openai_image_quality,
            &mut self.openai_image_output_format,
            &mut self.callback_internal_host,
            &mut self.callback_tunnel_netloc,
        ] {
            *value = value.trim().to_string();
        }
        self.quota_error_signatures.retain(|s| !s.trim().is_empty());
        self
    }

    /// Results bucket, falling back to the legacy `COS_BUCKET`.
    pub fn output_bucket(&self) -> &str {
        if self.cos_output_bucket.is_empty() {
            &self.cos_bucket
        } else {
            &self.cos_output_bucket
        }
    }

    pub fn input_bucket(&self) -> Option<&str> {
        Some(self.cos_input_bucket.as_str()).filter(|b| !b.is_empty())
    }

    pub fn storage_settings(&self) -> Result<StorageSettings, ConfigError> {
        let mut missing = Vec::new();
        if self.cos_endpoint.is_empty() {
            missing.push("COS_ENDPOINT");
        }
        if self.cos_access_key_id.is_empty() {
            missing.push("COS_ACCESS_KEY_ID");
        }
        if self.cos_secret_access_key.is_empty() {
            missing.push("COS_SECRET_ACCESS_KEY");
        }
        if self.output_bucket().is_empty() {
            missing.push("COS_OUTPUT_BUCKET (or COS_BUCKET)");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingStorage(missing));
        }

        Ok(StorageSettings {
            endpoint: self.cos_endpoint.clone(),
            region: self.cos_region.clone(),
            access_key: self.cos_access_key_id.clone(),
            secret_key: self.cos_secret_access_key.clone(),
        })
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        if self.openai_api_key.is_empty() {
            return Err(ConfigError::MissingEngineKey);
        }

        let output_format = self
            .openai_image_output_format
            .parse::<OutputFormat>()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "OPENAI_IMAGE_OUTPUT_FORMAT must be png, jpeg or webp (got {:?})",
                    self.openai_image_output_format
                ))
            })?;

        Ok(EngineSettings {
            api_key: self.openai_api_key.clone(),
            api_base: self.openai_api_base.trim_end_matches('/').to_string(),
            model: self.openai_image_model.clone(),
            quality: self.openai_image_quality.clone(),
            output_format,
            timeout: Duration::from_secs(self.openai_timeout_secs),
        })
    }

    pub fn callback_settings(&self) -> CallbackSettings {
        CallbackSettings {
            internal_host: self.callback_internal_host.clone(),
            internal_port: self.callback_internal_port,
            tunnel_netloc: Some(self.callback_tunnel_netloc.clone()).filter(|n| !n.is_empty()),
            connect_timeout: Duration::from_secs(self.callback_connect_timeout_secs),
            timeout: Duration::from_secs(self.callback_timeout_secs),
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            input_bucket: self.input_bucket().map(str::to_string),
            input_prefix: self.cos_input_prefix.clone(),
            output_bucket: self.output_bucket().to_string(),
            output_prefix: self.cos_output_prefix.clone(),
            concurrency: self.batch_concurrency.max(1),
        }
    }

    /// Fails unless a batch run has an input bucket to enumerate.
    pub fn require_input_bucket(&self) -> Result<&str, ConfigError> {
        self.input_bucket().ok_or(ConfigError::MissingInputBucket)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cos_endpoint: String::new(),
            cos_region: default_cos_region(),
            cos_access_key_id: String::new(),
            cos_secret_access_key: String::new(),
            cos_bucket: String::new(),
            cos_output_bucket: String::new(),
            cos_input_bucket: String::new(),
            cos_input_prefix: String::new(),
            cos_output_prefix: default_output_prefix(),
            cos_presign_expires: default_presign_expires(),
            openai_api_key: String::new(),
            openai_api_base: default_openai_api_base(),
            openai_image_model: default_openai_image_model(),
            openai_image_quality: default_openai_image_quality(),
            openai_image_output_format: default_openai_image_output_format(),
            openai_timeout_secs: default_openai_timeout_secs(),
            quota_error_signatures: default_quota_error_signatures(),
            callback_internal_host: default_callback_internal_host(),
            callback_internal_port: default_callback_internal_port(),
            callback_tunnel_netloc: default_callback_tunnel_netloc(),
            callback_connect_timeout_secs: default_callback_connect_timeout_secs(),
            callback_timeout_secs: default_callback_timeout_secs(),
            batch_concurrency: default_batch_concurrency(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing COS env vars: {}", .0.join(", "))]
    MissingStorage(Vec<&'static str>),

    #[error("Missing env var: OPENAI_API_KEY")]
    MissingEngineKey,

    #[error("Missing env var: COS_INPUT_BUCKET")]
    MissingInputBucket,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
