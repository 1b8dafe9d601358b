use crate::{
    errors::{UploadError, UploadFailure},
    object_store::ObjectStore,
    types::{FunctionUploadDetails, UploadedCode},
    utils::spawn_stage,
};
use std::{path::Path, sync::Arc};

/// Uploads packaged archives to the object store.
#[derive(Clone)]
pub struct CodeUploader {
    store: Arc<dyn ObjectStore>,
}

impl CodeUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Stores the archive at `archive` as `<details.name>.zip` in `bucket`.
    ///
    /// Exactly one put is issued, on a spawned task. Whatever goes wrong is
    /// reported as [`UploadError`] with the cause attached.
    pub async fn upload(
        &self,
        details: &FunctionUploadDetails,
        archive: &Path,
        bucket: &str,
    ) -> Result<UploadedCode, UploadError> {
        let key = details.to_archive_key();

        tracing::info!(%bucket, %key, archive = %archive.display(), "Uploading function code.");

        let version = self
            .put(archive, bucket, &key)
            .await
            .map_err(|source| UploadError {
                function_name: details.name.clone(),
                bucket: bucket.to_string(),
                key: key.clone(),
                source,
            })?;

        tracing::info!(%bucket, %key, ?version, "Function code uploaded.");

        Ok(UploadedCode::new(bucket, key, version))
    }

    async fn put(
        &self,
        archive: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<Option<String>, UploadFailure> {
        if bucket.trim().is_empty() {
            return Err(UploadFailure::EmptyBucket);
        }

        tokio::fs::metadata(archive)
            .await
            .map_err(|source| UploadFailure::Archive {
                path: archive.to_path_buf(),
                source,
            })?;

        let store = Arc::clone(&self.store);
        let archive = archive.to_path_buf();
        let bucket = bucket.to_string();
        let key = key.to_string();

        spawn_stage(async move {
            store
                .put_object(&bucket, &key, &archive)
                .await
                .map_err(UploadFailure::Store)
        })
        .await
    }
}
