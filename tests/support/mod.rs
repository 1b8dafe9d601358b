#![allow(dead_code)]

use async_trait::async_trait;
use lambda_deployer::{
    creator::LambdaCreator,
    errors::PackageError,
    lifecycle::FunctionLifecycleManager,
    memory::{MemoryFunctionService, MemoryObjectStore},
    packager::Packager,
    session::StaticSessionProvider,
    types::{Artifact, FunctionUploadDetails, ModuleSource, SessionIdentity, TracingMode},
    uploader::CodeUploader,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tempfile::TempDir;

pub const BUCKET: &str = "my-bucket";
pub const CREDENTIAL_ID: &str = "profile:integration";
pub const REGION: &str = "us-east-1";

/// Hands out an archive it wrote up front, whatever the module.
pub struct PrebuiltPackager {
    archive: PathBuf,
    calls: AtomicUsize,
}

impl PrebuiltPackager {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Packager for PrebuiltPackager {
    async fn create_package(
        &self,
        _module: &ModuleSource,
        _source_file: &Path,
    ) -> Result<Artifact, PackageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Artifact {
            location: self.archive.clone(),
        })
    }
}

/// Always fails as if the module root were missing.
pub struct FailingPackager;

#[async_trait]
impl Packager for FailingPackager {
    async fn create_package(
        &self,
        module: &ModuleSource,
        _source_file: &Path,
    ) -> Result<Artifact, PackageError> {
        Err(PackageError::ModuleRoot(module.root.clone()))
    }
}

pub fn details(name: &str) -> FunctionUploadDetails {
    FunctionUploadDetails {
        name: name.to_string(),
        description: String::from("integration test function"),
        handler: String::from("pkg.Handler::go"),
        runtime: String::from("java8"),
        role_arn: String::from("arn:aws:iam::123:role/r"),
        timeout: 30,
        memory_size: 512,
        env_vars: BTreeMap::from([(String::from("STAGE"), String::from("test"))]),
        tracing_mode: TracingMode::PassThrough,
    }
}

pub fn module(name: &str) -> ModuleSource {
    ModuleSource::new(name, format!("/modules/{name}"))
}

pub fn identity() -> SessionIdentity {
    SessionIdentity::new(CREDENTIAL_ID, REGION)
}

/// A creator wired to in-memory collaborators.
pub struct Harness {
    pub creator: LambdaCreator,
    pub packager: Arc<PrebuiltPackager>,
    pub store: Arc<MemoryObjectStore>,
    pub service: Arc<MemoryFunctionService>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_service(MemoryFunctionService::new())
    }

    /// The packager hands out an archive named unlike any function.
    pub fn with_service(service: MemoryFunctionService) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("build-7f3a.zip");
        std::fs::write(&archive, b"PK\x05\x06").unwrap();

        let packager = Arc::new(PrebuiltPackager::new(archive));
        let store = Arc::new(MemoryObjectStore::new());
        let service = Arc::new(service);

        let creator = LambdaCreator::new(
            packager.clone(),
            CodeUploader::new(store.clone()),
            FunctionLifecycleManager::new(
                service.clone(),
                Arc::new(StaticSessionProvider::new(identity())),
            ),
        );

        Self {
            creator,
            packager,
            store,
            service,
            _dir: dir,
        }
    }
}
