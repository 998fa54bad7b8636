//! Object storage gateway for book documents.
//!
//! Book files never travel through the API on reads: callers receive a
//! short-lived presigned URL instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use thiserror::Error;

use crate::config::StorageConfig;
use crate::error::AppError;

const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{0}' not found")]
    NotFound(String),
    #[error("invalid object key: {0}")]
    InvalidKey(#[from] object_store::path::Error),
    #[error("storage backend failure: {0}")]
    Backend(#[from] object_store::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                tracing::warn!("Stored object {} is missing", key);
                AppError::NotFound("stored file not found".to_string())
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, key: &str, content: Bytes, content_type: &str) -> StorageResult<()>;

    /// A URL granting GET access to `key` for `ttl`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Generates `books/<uuid>[.<ext>]` for an uploaded filename.
pub fn generate_storage_key(filename: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("books/{}.{}", id, ext.to_ascii_lowercase()),
        None => format!("books/{}", id),
    }
}

fn put_options(content_type: &str) -> PutOptions {
    let mut attributes = Attributes::new();
    if !content_type.is_empty() {
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
    }
    PutOptions { attributes, ..Default::default() }
}

pub struct S3Storage {
    store: AmazonS3,
}

impl S3Storage {
    pub fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&cfg.bucket)
            .with_region(&cfg.region);
        if let Some(key_id) = cfg.access_key_id.as_deref() {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = cfg.secret_access_key.as_deref() {
            builder = builder.with_secret_access_key(secret);
        }
        // S3-compatible services (MinIO and friends)
        if let Some(endpoint) = cfg.endpoint.as_deref() {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create S3 store: {}", e))?;
        Ok(Self { store })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, key: &str, content: Bytes, content_type: &str) -> StorageResult<()> {
        let path = ObjectPath::parse(key)?;
        self.store
            .put_opts(&path, PutPayload::from(content), put_options(content_type))
            .await?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let path = ObjectPath::parse(key)?;
        let url = self.store.signed_url(Method::GET, &path, ttl).await?;
        Ok(url.to_string())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = ObjectPath::parse(key)?;
        self.store.delete(&path).await?;
        Ok(())
    }
}

/// In-process storage for development and tests.
pub struct MemoryStorage {
    bucket: String,
    store: InMemory,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), store: InMemory::new() }
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = ObjectPath::parse(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, key: &str, content: Bytes, content_type: &str) -> StorageResult<()> {
        let path = ObjectPath::parse(key)?;
        self.store
            .put_opts(&path, PutPayload::from(content), put_options(content_type))
            .await?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{}/{}?expires={}", self.bucket, key, expires))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = ObjectPath::parse(key)?;
        self.store.delete(&path).await?;
        Ok(())
    }
}

/// Builds the configured backend.
pub fn from_config(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    match cfg.backend.as_str() {
        "s3" => {
            tracing::info!("Using S3 object storage (bucket: {}, region: {})", cfg.bucket, cfg.region);
            Ok(Arc::new(S3Storage::new(cfg)?))
        }
        "memory" => {
            tracing::warn!("Using in-memory object storage; uploaded books are lost on restart");
            Ok(Arc::new(MemoryStorage::new(cfg.bucket.clone())))
        }
        other => anyhow::bail!("unknown storage backend '{}'", other),
    }
}
