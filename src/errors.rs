use crate::creator::DeploymentStage;
use std::path::PathBuf;
use thiserror::Error as ThisError;
use tokio::task::JoinError;
use zip::result::ZipError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(ThisError, Debug)]
pub enum InvalidDetailsError {
    #[error("Field {0} must not be empty.")]
    Empty(&'static str),
    #[error("Timeout of {0}s is out of range.")]
    Timeout(u32),
    #[error("Memory size of {0}MB is out of range.")]
    MemorySize(u32),
}

#[derive(ThisError, Debug)]
pub enum PackageError {
    #[error("Module root {0:?} is not a directory.")]
    ModuleRoot(PathBuf),
    #[error("Source file {0:?} does not exist.")]
    SourceNotFound(PathBuf),
    #[error("Source file {source_file:?} is not inside module root {root:?}.")]
    SourceOutsideModule { source_file: PathBuf, root: PathBuf },
    #[error("IO error")]
    Io(
        #[source]
        #[from]
        std::io::Error,
    ),
    #[error("Zip error")]
    Zip(
        #[source]
        #[from]
        ZipError,
    ),
    #[error("Packaging task failed")]
    Task(
        #[source]
        #[from]
        JoinError,
    ),
}

#[derive(ThisError, Debug)]
pub enum ObjectStoreError {
    #[error("Failed to read archive {path:?}")]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("Bucket does not exist: {0}")]
    NoSuchBucket(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Object store error")]
    Service(#[source] BoxError),
}

/// The single error kind a failed upload is reported as.
#[derive(ThisError, Debug)]
#[error("Upload failed for function {function_name} to {bucket}/{key}")]
pub struct UploadError {
    pub function_name: String,
    pub bucket: String,
    pub key: String,
    #[source]
    pub source: UploadFailure,
}

#[derive(ThisError, Debug)]
pub enum UploadFailure {
    #[error("Bucket name is empty.")]
    EmptyBucket,
    #[error("Archive {path:?} is not readable")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Store rejected the object")]
    Store(#[source] ObjectStoreError),
    #[error("Upload task failed")]
    Task(
        #[source]
        #[from]
        JoinError,
    ),
}

/// Errors as reported by the function-management service.
#[derive(ThisError, Debug)]
pub enum FunctionServiceError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Function conflict: {0}")]
    Conflict(String),
    #[error("Function not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Too many requests: {0}")]
    Throttled(String),
    #[error("Response is missing field {0}.")]
    MalformedResponse(&'static str),
    #[error("Service error")]
    Service(#[source] BoxError),
}

#[derive(ThisError, Debug)]
pub enum LifecycleError {
    #[error("Failed to create function")]
    Create(#[source] FunctionServiceError),
    #[error("Failed to update function code")]
    UpdateCode(#[source] FunctionServiceError),
    #[error("Failed to update function configuration")]
    UpdateConfiguration(#[source] FunctionServiceError),
    /// Code was updated, configuration was not.
    #[error("Function code was updated but updating its configuration failed")]
    PartialUpdate(#[source] FunctionServiceError),
    #[error("Lifecycle task failed")]
    Task(
        #[source]
        #[from]
        JoinError,
    ),
}

impl LifecycleError {
    pub fn is_partial_update(&self) -> bool {
        matches!(self, LifecycleError::PartialUpdate(_))
    }

    /// The service's error, untouched.
    pub fn service_error(&self) -> Option<&FunctionServiceError> {
        match self {
            LifecycleError::Create(error)
            | LifecycleError::UpdateCode(error)
            | LifecycleError::UpdateConfiguration(error)
            | LifecycleError::PartialUpdate(error) => Some(error),
            LifecycleError::Task(_) => None,
        }
    }
}

/// A failed deployment, carrying the failing stage's error as is.
#[derive(ThisError, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Package(PackageError),
    #[error(transparent)]
    Upload(UploadError),
    #[error(transparent)]
    Create(LifecycleError),
    #[error(transparent)]
    Update(LifecycleError),
}

impl DeployError {
    /// Stage the deployment was in when it failed.
    pub fn stage(&self) -> DeploymentStage {
        match self {
            DeployError::Package(_) => DeploymentStage::Packaging,
            DeployError::Upload(_) => DeploymentStage::Uploading,
            DeployError::Create(_) => DeploymentStage::Creating,
            DeployError::Update(
                LifecycleError::UpdateConfiguration(_) | LifecycleError::PartialUpdate(_),
            ) => DeploymentStage::UpdatingConfiguration,
            DeployError::Update(_) => DeploymentStage::UpdatingCode,
        }
    }
}
