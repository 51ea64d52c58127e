//! Object storage destination (S3, local filesystem, in-memory)

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;

/// Server side encryption types that map to SSE-KMS
const KMS_ENCRYPTION_TYPES: [&str; 2] = ["aws:kms", "kms"];

/// Build an S3 client from the target configuration
///
/// Starts from the standard `AWS_*` environment variables; explicit config
/// values take precedence. `aws:kms` encryption requires `encryption_key`.
pub fn build_s3(config: &TargetConfig) -> Result<AmazonS3> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&config.s3_bucket)
        .with_region(config.region());

    if let Some(key_id) = &config.aws_access_key_id {
        builder = builder.with_access_key_id(key_id);
    }
    if let Some(secret) = &config.aws_secret_access_key {
        builder = builder.with_secret_access_key(secret);
    }
    if let Some(token) = &config.aws_session_token {
        builder = builder.with_token(token);
    }
    if let Some(endpoint) = &config.aws_endpoint {
        builder = builder
            .with_allow_http(endpoint.starts_with("http://"))
            .with_endpoint(endpoint);
    }

    match config.encryption_type.as_deref() {
        Some(kind) if KMS_ENCRYPTION_TYPES.contains(&kind.to_ascii_lowercase().as_str()) => {
            let key = config.encryption_key.as_deref().ok_or_else(|| {
                Error::invalid_value("encryption_key", "required for aws:kms encryption")
            })?;
            builder = builder.with_sse_kms_encryption(key);
        }
        Some(kind) => {
            tracing::debug!("Encryption type {kind} left to the bucket default");
        }
        None => {}
    }

    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to create s3 client: {e}")))
}

/// Object storage destination for batch files
#[derive(Debug, Clone)]
pub struct CloudDestination {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Bucket name, or the root directory for local stores
    bucket: String,
    /// URL scheme for logging
    scheme: String,
}

impl CloudDestination {
    /// Build an S3 destination from the target configuration
    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        let store = build_s3(config)?;
        Ok(Self {
            store: Arc::new(store),
            bucket: config.s3_bucket.clone(),
            scheme: "s3".to_string(),
        })
    }

    /// Local filesystem destination rooted at `root`
    pub fn local(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            Error::config(format!("Failed to create directory {}: {e}", root.display()))
        })?;

        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: root.display().to_string(),
            scheme: "file".to_string(),
        })
    }

    /// In-memory destination
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemory::new()), "memory")
    }

    /// Wrap an existing object store
    pub fn with_store(store: Arc<dyn ObjectStore>, scheme: impl Into<String>) -> Self {
        Self {
            store,
            bucket: String::new(),
            scheme: scheme.into(),
        }
    }

    /// Check if this is a cloud destination
    pub fn is_cloud(&self) -> bool {
        self.scheme == "s3"
    }

    /// Get the scheme (s3, file, memory)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Underlying object store
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    fn display_path(&self, key: &ObjectPath) -> String {
        if self.bucket.is_empty() {
            format!("{}://{key}", self.scheme)
        } else {
            format!("{}://{}/{key}", self.scheme, self.bucket)
        }
    }

    /// Store bytes at `key`, returning the full object URI
    pub async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let path = ObjectPath::from(key);
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::upload(key, e.to_string()))?;
        Ok(self.display_path(&path))
    }

    /// Upload a local file to `key`, returning the full object URI
    pub async fn upload_file(&self, local_path: &Path, key: &str) -> Result<String> {
        let data = tokio::fs::read(local_path).await?;
        let size = data.len();
        let uri = self.put(key, Bytes::from(data)).await?;
        tracing::info!("Uploaded {} ({size} bytes) to {uri}", local_path.display());
        Ok(uri)
    }
}
