use crate::{
    consts::{
        DEFAULT_MEMORY_SIZE_MB, DEFAULT_TIMEOUT_SECS, MAX_MEMORY_SIZE_MB, MAX_TIMEOUT_SECS,
        MIN_MEMORY_SIZE_MB, MIN_TIMEOUT_SECS,
    },
    errors::InvalidDetailsError,
    utils::archive_key,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// Distributed-trace instrumentation of a deployed function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum TracingMode {
    Active,
    #[default]
    PassThrough,
}

impl TracingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingMode::Active => "Active",
            TracingMode::PassThrough => "PassThrough",
        }
    }
}

impl fmt::Display for TracingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_memory_size() -> u32 {
    DEFAULT_MEMORY_SIZE_MB
}

/// Everything the user supplied about the function being deployed.
///
/// Built once by a collaborator (the CLI or a details file) and only ever
/// borrowed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionUploadDetails {
    /// name of the function, also used to derive the object key
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// handler identifier, e.g. `pkg.Handler::handleRequest`
    pub handler: String,

    /// runtime identifier, e.g. `java8`
    pub runtime: String,

    /// ARN of the IAM role the function assumes
    pub role_arn: String,

    /// timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u32,

    /// memory size in MB
    #[serde(default = "default_memory_size")]
    pub memory_size: u32,

    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,

    #[serde(default)]
    pub tracing_mode: TracingMode,
}

impl FunctionUploadDetails {
    /// Object key the function's archive is stored under.
    pub fn to_archive_key(&self) -> String {
        archive_key(&self.name)
    }

    /// Checks the details before a pipeline is started.
    ///
    /// The pipeline itself never calls this: rejections of anything that
    /// passes here are left to the remote service.
    pub fn validate(&self) -> Result<(), InvalidDetailsError> {
        if self.name.trim().is_empty() {
            return Err(InvalidDetailsError::Empty("name"));
        }
        if self.handler.trim().is_empty() {
            return Err(InvalidDetailsError::Empty("handler"));
        }
        if self.runtime.trim().is_empty() {
            return Err(InvalidDetailsError::Empty("runtime"));
        }
        if self.role_arn.trim().is_empty() {
            return Err(InvalidDetailsError::Empty("role_arn"));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout) {
            return Err(InvalidDetailsError::Timeout(self.timeout));
        }
        if !(MIN_MEMORY_SIZE_MB..=MAX_MEMORY_SIZE_MB).contains(&self.memory_size) {
            return Err(InvalidDetailsError::MemorySize(self.memory_size));
        }

        Ok(())
    }
}

/// Reference to a stored code archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedCode {
    pub bucket: String,
    pub key: String,
    /// `None` if the store does not version objects
    pub version: Option<String>,
}

impl UploadedCode {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, version: Option<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version,
        }
    }
}

/// Credential and region the pipeline is running under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub credential_id: String,
    pub region: String,
}

impl SessionIdentity {
    pub fn new(credential_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            credential_id: credential_id.into(),
            region: region.into(),
        }
    }
}

/// Function as reported back by the function-management service.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub arn: String,
    pub description: String,
    pub handler: String,
    pub runtime: String,
    pub role_arn: String,
    pub timeout: u32,
    pub memory_size: u32,
    pub env_vars: BTreeMap<String, String>,
    pub tracing_mode: TracingMode,
    pub last_modified: Option<String>,
    pub code_sha256: Option<String>,
}

/// A deployed function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaFunction {
    pub name: String,
    pub arn: String,
    pub description: String,
    pub handler: String,
    pub runtime: String,
    pub role_arn: String,
    pub timeout: u32,
    pub memory_size: u32,
    pub env_vars: BTreeMap<String, String>,
    pub tracing_mode: TracingMode,
    pub last_modified: Option<String>,
    /// SHA-256 of the deployed code package, base64 encoded
    pub code_sha256: Option<String>,
    pub identity: SessionIdentity,
}

impl LambdaFunction {
    /// Only a successful create response may become a [`LambdaFunction`].
    pub(crate) fn from_created(created: FunctionDescriptor, identity: SessionIdentity) -> Self {
        Self {
            name: created.name,
            arn: created.arn,
            description: created.description,
            handler: created.handler,
            runtime: created.runtime,
            role_arn: created.role_arn,
            timeout: created.timeout,
            memory_size: created.memory_size,
            env_vars: created.env_vars,
            tracing_mode: created.tracing_mode,
            last_modified: created.last_modified,
            code_sha256: created.code_sha256,
            identity,
        }
    }
}

/// Module handed to the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: String,
    pub root: PathBuf,
}

impl ModuleSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

/// Packaged, deployable output of a [`Packager`](crate::packager::Packager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub location: PathBuf,
}
