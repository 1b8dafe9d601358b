//! In-memory collaborators.
//!
//! These keep everything in process and record every call they receive. They
//! are meant for tests, not for deploying anything.

use crate::{
    errors::{FunctionServiceError, ObjectStoreError},
    function_config::FunctionConfiguration,
    lambda_client::FunctionService,
    object_store::ObjectStore,
    request::{CreateFunctionRequest, UpdateFunctionCodeRequest},
    types::{FunctionDescriptor, UploadedCode},
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub version: Option<String>,
}

/// In-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    versioning: bool,
    next_version: AtomicU64,
    puts: AtomicUsize,
    next_failure: Mutex<Option<ObjectStoreError>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `v1`, `v2`, ... to stored objects.
    pub fn with_versioning() -> Self {
        Self {
            versioning: true,
            ..Self::default()
        }
    }

    /// The next put fails with `error` without storing anything.
    pub fn fail_next_put(&self, error: ObjectStoreError) {
        *lock(&self.next_failure) = Some(error);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<Option<String>, ObjectStoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        let failure = lock(&self.next_failure).take();
        if let Some(error) = failure {
            return Err(error);
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|error| ObjectStoreError::ReadArchive {
                path: path.to_path_buf(),
                source: Box::new(error),
            })?;

        let version = self.versioning.then(|| {
            let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
            format!("v{version}")
        });

        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                version: version.clone(),
            },
        );

        Ok(version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionOperation {
    Create,
    UpdateCode,
    UpdateConfiguration,
    WaitUntilReady,
}

/// A call received by [`MemoryFunctionService`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub operation: FunctionOperation,
    pub function_name: String,
}

#[derive(Debug, Clone)]
struct DeployedFunction {
    configuration: FunctionConfiguration,
    code: UploadedCode,
    revision: u64,
    busy_until: Option<Instant>,
}

impl DeployedFunction {
    fn is_busy(&self) -> bool {
        self.busy_until
            .map_or(false, |busy_until| Instant::now() < busy_until)
    }
}

/// In-memory [`FunctionService`].
#[derive(Debug)]
pub struct MemoryFunctionService {
    region: String,
    account_id: String,
    latency: Option<Duration>,
    update_window: Option<Duration>,
    functions: Mutex<BTreeMap<String, DeployedFunction>>,
    calls: Mutex<Vec<FunctionCall>>,
    failures: Mutex<HashMap<FunctionOperation, FunctionServiceError>>,
}

impl Default for MemoryFunctionService {
    fn default() -> Self {
        Self {
            region: String::from("us-east-1"),
            account_id: String::from("123456789012"),
            latency: None,
            update_window: None,
            functions: Mutex::default(),
            calls: Mutex::default(),
            failures: Mutex::default(),
        }
    }
}

impl MemoryFunctionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every accepted change keeps the function busy for `window`. Changes
    /// sent while it is busy are rejected with a conflict, as the real
    /// service does.
    pub fn with_update_window(mut self, window: Duration) -> Self {
        self.update_window = Some(window);
        self
    }

    /// The next call of `operation` fails with `error` and changes nothing.
    pub fn fail_next(&self, operation: FunctionOperation, error: FunctionServiceError) {
        lock(&self.failures).insert(operation, error);
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, operation: FunctionOperation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn configuration(&self, function_name: &str) -> Option<FunctionConfiguration> {
        lock(&self.functions)
            .get(function_name)
            .map(|function| function.configuration.clone())
    }

    pub fn code(&self, function_name: &str) -> Option<UploadedCode> {
        lock(&self.functions)
            .get(function_name)
            .map(|function| function.code.clone())
    }

    fn arn(&self, function_name: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}",
            self.region, self.account_id, function_name
        )
    }

    fn busy_until(&self) -> Option<Instant> {
        self.update_window.map(|window| Instant::now() + window)
    }

    fn change<'a>(
        &self,
        functions: &'a mut BTreeMap<String, DeployedFunction>,
        name: &str,
    ) -> Result<&'a mut DeployedFunction, FunctionServiceError> {
        let function = functions
            .get_mut(name)
            .ok_or_else(|| FunctionServiceError::NotFound(format!("Function not found: {name}")))?;

        if function.is_busy() {
            return Err(FunctionServiceError::Conflict(format!(
                "An update is in progress for resource: {}",
                self.arn(name)
            )));
        }

        function.revision += 1;
        function.busy_until = self.busy_until();
        Ok(function)
    }

    fn describe(&self, function: &DeployedFunction) -> FunctionDescriptor {
        let configuration = &function.configuration;
        FunctionDescriptor {
            name: configuration.function_name.clone(),
            arn: self.arn(&configuration.function_name),
            description: configuration.description.clone(),
            handler: configuration.handler.clone(),
            runtime: configuration.runtime.clone(),
            role_arn: configuration.role.clone(),
            timeout: configuration.timeout,
            memory_size: configuration.memory_size,
            env_vars: configuration.environment.clone(),
            tracing_mode: configuration.tracing_mode,
            last_modified: Some(format!("revision-{}", function.revision)),
            code_sha256: None,
        }
    }

    async fn receive(
        &self,
        operation: FunctionOperation,
        function_name: &str,
    ) -> Result<(), FunctionServiceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        lock(&self.calls).push(FunctionCall {
            operation,
            function_name: function_name.to_string(),
        });

        let failure = lock(&self.failures).remove(&operation);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FunctionService for MemoryFunctionService {
    async fn create_function(
        &self,
        request: CreateFunctionRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let name = request.configuration.function_name.clone();
        self.receive(FunctionOperation::Create, &name).await?;

        let mut functions = lock(&self.functions);
        if functions.contains_key(&name) {
            return Err(FunctionServiceError::Conflict(format!(
                "Function already exist: {name}"
            )));
        }

        let function = DeployedFunction {
            configuration: request.configuration,
            code: request.code,
            revision: 1,
            busy_until: self.busy_until(),
        };
        let descriptor = self.describe(&function);
        functions.insert(name, function);

        Ok(descriptor)
    }

    async fn update_function_code(
        &self,
        request: UpdateFunctionCodeRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let name = request.function_name;
        self.receive(FunctionOperation::UpdateCode, &name).await?;

        let mut functions = lock(&self.functions);
        let function = self.change(&mut functions, &name)?;
        function.code = request.code;

        Ok(self.describe(function))
    }

    async fn update_function_configuration(
        &self,
        configuration: FunctionConfiguration,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let name = configuration.function_name.clone();
        self.receive(FunctionOperation::UpdateConfiguration, &name)
            .await?;

        let mut functions = lock(&self.functions);
        let function = self.change(&mut functions, &name)?;
        function.configuration = configuration;

        Ok(self.describe(function))
    }

    async fn wait_until_ready(&self, function_name: &str) -> Result<(), FunctionServiceError> {
        self.receive(FunctionOperation::WaitUntilReady, function_name)
            .await?;

        let busy_until = lock(&self.functions)
            .get(function_name)
            .map(|function| function.busy_until)
            .ok_or_else(|| {
                FunctionServiceError::NotFound(format!("Function not found: {function_name}"))
            })?;

        if let Some(busy_until) = busy_until {
            tokio::time::sleep_until(busy_until).await;
        }

        Ok(())
    }
}
