use base64::Engine;
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::models::payload::ArtifactLocator;
use crate::services::engine::ProcessingResult;
use crate::services::storage::{ObjectStore, StorageError};

/// Destination for a single-job result, chosen by the accepting endpoint.
#[derive(Clone)]
pub enum ArtifactSink {
    /// Echo the bytes back as base64.
    Inline,
    /// Upload, then hand out a presigned URL.
    Stored {
        store: Arc<dyn ObjectStore>,
        bucket: String,
        ttl_secs: u32,
    },
}

impl ArtifactSink {
    pub fn stored(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, ttl_secs: u32) -> Self {
        Self::Stored {
            store,
            bucket: bucket.into(),
            ttl_secs,
        }
    }

    /// Persist `result` and return its locator. `key` is ignored inline.
    pub async fn store(
        &self,
        key: &str,
        result: ProcessingResult,
    ) -> Result<ArtifactLocator, StorageError> {
        match self {
            Self::Inline => Ok(ArtifactLocator::Inline {
                result_image_base64: base64::engine::general_purpose::STANDARD
                    .encode(&result.bytes),
                result_mime_type: result.mime_type,
            }),
            Self::Stored {
                store,
                bucket,
                ttl_secs,
            } => {
                store
                    .put(bucket, key, &result.bytes, &result.mime_type)
                    .await?;
                tracing::debug!(bucket = %bucket, key = %key, bytes = result.bytes.len(), "Result uploaded");

                let url = store.presign(bucket, key, *ttl_secs).await.inspect_err(|e| {
                    tracing::warn!(key = %key, error = %e, "Result uploaded but presign failed");
                })?;

                Ok(ArtifactLocator::Stored {
                    object_key: key.to_string(),
                    result_url: url,
                    expires_in: *ttl_secs,
                    expires_at: Utc::now() + Duration::seconds(i64::from(*ttl_secs)),
                })
            }
        }
    }
}
