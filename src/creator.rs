//! End-to-end deployment flows.
//!
//! A deployment moves through
//!
//! ```text
//! Packaging -> Uploading -> Creating                                  -> Done
//!                        -> UpdatingCode [-> UpdatingConfiguration]   -> Done
//! ```
//!
//! and drops to `Failed` from whichever stage went wrong. Every stage starts
//! only once the previous one produced its result, and a failure stops the
//! chain.

use crate::{
    errors::DeployError,
    lifecycle::FunctionLifecycleManager,
    packager::Packager,
    types::{Artifact, FunctionUploadDetails, LambdaFunction, ModuleSource, UploadedCode},
    uploader::CodeUploader,
};
use std::{error::Error, fmt, path::Path, sync::Arc};
use tracing::{trace_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStage {
    Packaging,
    Uploading,
    Creating,
    UpdatingCode,
    UpdatingConfiguration,
    Done,
    Failed,
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            DeploymentStage::Packaging => "packaging",
            DeploymentStage::Uploading => "uploading",
            DeploymentStage::Creating => "creating",
            DeploymentStage::UpdatingCode => "updating code",
            DeploymentStage::UpdatingConfiguration => "updating configuration",
            DeploymentStage::Done => "done",
            DeploymentStage::Failed => "failed",
        };
        f.write_str(stage)
    }
}

/// Packages, uploads and then creates or updates a function.
///
/// Holds no state between calls, so one creator can run any number of
/// deployments at once. Deployments of the same function are not serialized.
#[derive(Clone)]
pub struct LambdaCreator {
    packager: Arc<dyn Packager>,
    uploader: CodeUploader,
    lifecycle: FunctionLifecycleManager,
}

impl LambdaCreator {
    pub fn new(
        packager: Arc<dyn Packager>,
        uploader: CodeUploader,
        lifecycle: FunctionLifecycleManager,
    ) -> Self {
        Self {
            packager,
            uploader,
            lifecycle,
        }
    }

    pub async fn create_lambda(
        &self,
        module: &ModuleSource,
        source_file: &Path,
        details: &FunctionUploadDetails,
        bucket: &str,
    ) -> Result<LambdaFunction, DeployError> {
        let span = trace_span!("CreateLambda", function = %details.name);

        async move {
            let code = self.package_and_upload(module, source_file, details, bucket).await?;

            tracing::info!(stage = %DeploymentStage::Creating, "Entering stage.");
            let function = self
                .lifecycle
                .create(details, &code)
                .await
                .map_err(|error| Self::failed(DeployError::Create(error)))?;

            tracing::info!(stage = %DeploymentStage::Done, arn = %function.arn, "Deployment finished.");
            Ok::<_, DeployError>(function)
        }
        .instrument(span)
        .await
    }

    pub async fn update_lambda(
        &self,
        module: &ModuleSource,
        source_file: &Path,
        details: &FunctionUploadDetails,
        bucket: &str,
        replace_configuration: bool,
    ) -> Result<(), DeployError> {
        let span = trace_span!("UpdateLambda", function = %details.name, replace_configuration);

        async move {
            let code = self.package_and_upload(module, source_file, details, bucket).await?;

            tracing::info!(stage = %DeploymentStage::UpdatingCode, "Entering stage.");
            self.lifecycle
                .update(details, &code, replace_configuration)
                .await
                .map_err(|error| Self::failed(DeployError::Update(error)))?;

            tracing::info!(stage = %DeploymentStage::Done, "Deployment finished.");
            Ok::<_, DeployError>(())
        }
        .instrument(span)
        .await
    }

    async fn package_and_upload(
        &self,
        module: &ModuleSource,
        source_file: &Path,
        details: &FunctionUploadDetails,
        bucket: &str,
    ) -> Result<UploadedCode, DeployError> {
        tracing::info!(stage = %DeploymentStage::Packaging, module = %module.name, "Entering stage.");
        let Artifact { location } = self
            .packager
            .create_package(module, source_file)
            .instrument(trace_span!("Package"))
            .await
            .map_err(|error| Self::failed(DeployError::Package(error)))?;

        tracing::info!(stage = %DeploymentStage::Uploading, "Entering stage.");
        self.uploader
            .upload(details, &location, bucket)
            .instrument(trace_span!("Upload"))
            .await
            .map_err(|error| Self::failed(DeployError::Upload(error)))
    }

    fn failed(error: DeployError) -> DeployError {
        tracing::error!(
            stage = %DeploymentStage::Failed,
            failed_stage = %error.stage(),
            error = &error as &(dyn Error + 'static),
            "Deployment failed."
        );
        error
    }
}
