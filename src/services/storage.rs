use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::config::StorageSettings;

/// One page of a key listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// Object storage capability used by the orchestrators.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StorageError>;

    /// Time-limited GET URL for `key`.
    async fn presign(&self, bucket: &str, key: &str, ttl_secs: u32) -> Result<String, StorageError>;

    /// Every object key under `prefix`, following continuation tokens.
    /// Directory placeholders (keys ending in `/`) are skipped.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut token = None;

        loop {
            let page = self.list_page(bucket, prefix, token).await?;
            keys.extend(page.keys.into_iter().filter(|k| !k.ends_with('/')));

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }
}

/// Client for S3-compatible object storage (path-style addressing).
pub struct S3Store {
    region: Region,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(settings.access_key.as_str()),
            Some(settings.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .await
            .map_err(|e| StorageError::read(key, e))?;

        match response.status_code() {
            200..=299 => Ok(response.to_vec()),
            code => Err(StorageError::read(key, format!("HTTP {code}"))),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| StorageError::write(key, e))?;

        match response.status_code() {
            200..=299 => Ok(()),
            code => Err(StorageError::write(key, format!("HTTP {code}"))),
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StorageError> {
        let (result, _code) = self
            .bucket(bucket)?
            .list_page(prefix.to_string(), None, token, None, None)
            .await
            .map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?;

        let next_token = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };

        Ok(ListPage {
            keys: result.contents.into_iter().map(|o| o.key).collect(),
            next_token,
        })
    }

    async fn presign(&self, bucket: &str, key: &str, ttl_secs: u32) -> Result<String, StorageError> {
        self.bucket(bucket)?
            .presign_get(key, ttl_secs, None)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("get_object {key} failed: {reason}")]
    Read { key: String, reason: String },

    #[error("put_object {key} failed: {reason}")]
    Write { key: String, reason: String },

    #[error("list_objects {prefix:?} failed: {reason}")]
    List { prefix: String, reason: String },

    #[error("presign {key} failed: {reason}")]
    Presign { key: String, reason: String },
}

impl StorageError {
    pub fn read(key: &str, reason: impl ToString) -> Self {
        Self::Read {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(key: &str, reason: impl ToString) -> Self {
        Self::Write {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Config(_) => "StorageConfigError",
            Self::Read { .. } => "StorageReadError",
            Self::Write { .. } => "StorageWriteError",
            Self::List { .. } => "StorageListError",
            Self::Presign { .. } => "StoragePresignError",
        }
    }
}
