use crate::errors::ObjectStoreError;
use async_trait::async_trait;
use aws_sdk_s3::{error::ProvideErrorMetadata, primitives::ByteStream, Client};
use std::path::Path;

/// Bucket-keyed storage for deployable archives.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the file at `path` under `bucket`/`key`, replacing any object
    /// already there.
    ///
    /// Returns the version the store assigned, if it versions objects.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<Option<String>, ObjectStoreError>;
}

impl From<aws_sdk_s3::Error> for ObjectStoreError {
    fn from(error: aws_sdk_s3::Error) -> Self {
        let message = error.message().unwrap_or_default().to_string();
        match error.code() {
            Some("NoSuchBucket") => ObjectStoreError::NoSuchBucket(message),
            Some("AccessDenied") => ObjectStoreError::AccessDenied(message),
            _ => ObjectStoreError::Service(Box::new(error)),
        }
    }
}

/// [`ObjectStore`] backed by S3.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<Option<String>, ObjectStoreError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|error| ObjectStoreError::ReadArchive {
                path: path.to_path_buf(),
                source: Box::new(error),
            })?;

        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|error| ObjectStoreError::from(aws_sdk_s3::Error::from(error)))?;

        tracing::debug!(e_tag = ?response.e_tag(), "Object stored.");

        Ok(response.version_id().map(ToString::to_string))
    }
}
