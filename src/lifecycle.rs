use crate::{
    creator::DeploymentStage,
    errors::{FunctionServiceError, LifecycleError},
    function_config::FunctionConfigBuilder,
    lambda_client::FunctionService,
    session::SessionProvider,
    types::{FunctionUploadDetails, LambdaFunction, UploadedCode},
    utils::spawn_stage,
};
use std::{error::Error, sync::Arc};
use tracing::{trace_span, Instrument};

/// Creates functions and updates their code and configuration.
///
/// Each operation runs on a spawned task. Nothing is retried here.
#[derive(Clone)]
pub struct FunctionLifecycleManager {
    service: Arc<dyn FunctionService>,
    session: Arc<dyn SessionProvider>,
}

impl FunctionLifecycleManager {
    pub fn new(service: Arc<dyn FunctionService>, session: Arc<dyn SessionProvider>) -> Self {
        Self { service, session }
    }

    /// Creates a function from `details` and the stored `code`, and waits for
    /// it to become active.
    pub async fn create(
        &self,
        details: &FunctionUploadDetails,
        code: &UploadedCode,
    ) -> Result<LambdaFunction, LifecycleError> {
        let request = FunctionConfigBuilder::new(details).to_create_request(code);
        let service = Arc::clone(&self.service);
        let session = Arc::clone(&self.session);

        tracing::info!(function = %details.name, "Creating function.");

        let function = spawn_stage(async move {
            let created = service
                .create_function(request)
                .await
                .map_err(LifecycleError::Create)?;

            service
                .wait_until_ready(&created.name)
                .instrument(trace_span!("WaitUntilReady"))
                .await
                .map_err(LifecycleError::Create)?;

            Ok::<_, LifecycleError>(LambdaFunction::from_created(
                created,
                session.active_session(),
            ))
        })
        .instrument(trace_span!("CreateFunction"))
        .await?;

        tracing::info!(function = %function.name, arn = %function.arn, "Function created.");

        Ok(function)
    }

    /// Updates the function's code, then, if `replace_configuration` is set,
    /// its configuration.
    ///
    /// Each change is waited on before the next one is sent. The two are not
    /// atomic: a failed configuration update after a successful code update
    /// is reported as [`LifecycleError::PartialUpdate`] and the new code
    /// stays deployed.
    pub async fn update(
        &self,
        details: &FunctionUploadDetails,
        code: &UploadedCode,
        replace_configuration: bool,
    ) -> Result<(), LifecycleError> {
        let builder = FunctionConfigBuilder::new(details);
        let code_request = builder.to_update_code_request(code);
        let service = Arc::clone(&self.service);
        let function = details.name.clone();

        spawn_stage(async move {
            tracing::info!(%function, "Updating function code.");

            service
                .update_function_code(code_request)
                .instrument(trace_span!("UpdateFunctionCode"))
                .await
                .map_err(LifecycleError::UpdateCode)?;

            service
                .wait_until_ready(&function)
                .instrument(trace_span!("WaitUntilReady"))
                .await
                .map_err(LifecycleError::UpdateCode)?;

            tracing::info!(%function, "Function code updated.");

            Ok::<_, LifecycleError>(())
        })
        .await?;

        if !replace_configuration {
            tracing::debug!(function = %details.name, "Keeping current configuration.");
            return Ok(());
        }

        tracing::info!(
            stage = %DeploymentStage::UpdatingConfiguration,
            function = %details.name,
            "Entering stage."
        );

        let configuration = builder.build();
        let service = Arc::clone(&self.service);
        let function = details.name.clone();

        spawn_stage(async move {
            let applied = match service
                .update_function_configuration(configuration)
                .instrument(trace_span!("UpdateFunctionConfiguration"))
                .await
            {
                Ok(_) => service.wait_until_ready(&function).await,
                Err(error) => Err(error),
            };
            applied.map_err(LifecycleError::PartialUpdate)
        })
        .await
        .map_err(|error| {
            let error = match error {
                LifecycleError::Task(panicked) => {
                    LifecycleError::PartialUpdate(FunctionServiceError::Service(Box::new(panicked)))
                }
                error => error,
            };
            tracing::error!(
                function = %details.name,
                error = &error as &(dyn Error + 'static),
                "Code was updated but configuration was not."
            );
            error
        })?;

        tracing::info!(function = %details.name, "Function configuration updated.");

        Ok(())
    }

    /// Replaces the function's configuration, leaving its code alone.
    pub async fn update_configuration(
        &self,
        details: &FunctionUploadDetails,
    ) -> Result<(), LifecycleError> {
        let configuration = FunctionConfigBuilder::new(details).build();
        let service = Arc::clone(&self.service);
        let function = details.name.clone();

        tracing::info!(function = %details.name, "Updating function configuration.");

        spawn_stage(async move {
            service
                .update_function_configuration(configuration)
                .await
                .map_err(LifecycleError::UpdateConfiguration)?;

            service
                .wait_until_ready(&function)
                .await
                .map_err(LifecycleError::UpdateConfiguration)?;

            Ok::<_, LifecycleError>(())
        })
        .instrument(trace_span!("UpdateFunctionConfiguration"))
        .await?;

        tracing::info!(function = %details.name, "Function configuration updated.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::DeployError,
        function_config::FunctionConfiguration,
        memory::{FunctionCall, FunctionOperation, MemoryFunctionService},
        request::{CreateFunctionRequest, UpdateFunctionCodeRequest},
        session::StaticSessionProvider,
        types::{FunctionDescriptor, SessionIdentity, TracingMode},
    };
    use async_trait::async_trait;
    use std::{
        collections::BTreeMap,
        io,
        sync::Mutex,
        time::Duration,
    };

    fn details(name: &str) -> FunctionUploadDetails {
        FunctionUploadDetails {
            name: name.to_string(),
            description: String::from("test function"),
            handler: String::from("pkg.Handler::go"),
            runtime: String::from("java8"),
            role_arn: String::from("arn:aws:iam::123:role/r"),
            timeout: 30,
            memory_size: 512,
            env_vars: BTreeMap::new(),
            tracing_mode: TracingMode::PassThrough,
        }
    }

    fn manager(service: Arc<MemoryFunctionService>) -> FunctionLifecycleManager {
        let session = StaticSessionProvider::new(SessionIdentity::new("profile:test", "us-east-1"));
        FunctionLifecycleManager::new(service, Arc::new(session))
    }

    fn call(operation: FunctionOperation, name: &str) -> FunctionCall {
        FunctionCall {
            operation,
            function_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn create_maps_response_and_session() {
        let service = Arc::new(MemoryFunctionService::new());
        let code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v1")));

        let function = manager(service.clone())
            .create(&details("fn1"), &code)
            .await
            .unwrap();

        assert_eq!(function.name, "fn1");
        assert_eq!(function.arn, "arn:aws:lambda:us-east-1:123456789012:function:fn1");
        assert_eq!(function.runtime, "java8");
        assert_eq!(function.role_arn, "arn:aws:iam::123:role/r");
        assert_eq!(function.timeout, 30);
        assert_eq!(function.memory_size, 512);
        assert_eq!(
            function.identity,
            SessionIdentity::new("profile:test", "us-east-1")
        );
        assert_eq!(service.code("fn1"), Some(code));
    }

    #[tokio::test]
    async fn create_passes_service_errors_through() {
        let service = Arc::new(MemoryFunctionService::new());
        service.fail_next(
            FunctionOperation::Create,
            FunctionServiceError::AccessDenied(String::from("not allowed to pass role")),
        );
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);

        let error = manager(service.clone())
            .create(&details("fn1"), &code)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            LifecycleError::Create(FunctionServiceError::AccessDenied(ref message))
                if message == "not allowed to pass role"
        ));
        assert_eq!(service.call_count(FunctionOperation::Create), 1);
    }

    #[tokio::test]
    async fn code_only_update_skips_configuration() {
        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);
        manager.create(&details("fn1"), &code).await.unwrap();

        let new_code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v2")));
        manager
            .update(&details("fn1"), &new_code, false)
            .await
            .unwrap();

        assert_eq!(service.call_count(FunctionOperation::UpdateCode), 1);
        assert_eq!(service.call_count(FunctionOperation::UpdateConfiguration), 0);
        assert_eq!(service.code("fn1"), Some(new_code));
    }

    #[tokio::test]
    async fn full_update_sends_code_then_configuration() {
        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);
        manager.create(&details("fn1"), &code).await.unwrap();

        let mut changed = details("fn1");
        changed.memory_size = 1024;
        manager.update(&changed, &code, true).await.unwrap();

        assert_eq!(
            service.calls(),
            vec![
                call(FunctionOperation::Create, "fn1"),
                call(FunctionOperation::WaitUntilReady, "fn1"),
                call(FunctionOperation::UpdateCode, "fn1"),
                call(FunctionOperation::WaitUntilReady, "fn1"),
                call(FunctionOperation::UpdateConfiguration, "fn1"),
                call(FunctionOperation::WaitUntilReady, "fn1"),
            ]
        );
        assert_eq!(service.configuration("fn1").unwrap().memory_size, 1024);
    }

    #[tokio::test]
    async fn failed_configuration_update_leaves_new_code_deployed() {
        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let old_code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v1")));
        manager.create(&details("fn1"), &old_code).await.unwrap();

        service.fail_next(
            FunctionOperation::UpdateConfiguration,
            FunctionServiceError::InvalidParameter(String::from("bad role")),
        );
        let new_code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v2")));
        let mut changed = details("fn1");
        changed.timeout = 120;

        let error = manager.update(&changed, &new_code, true).await.unwrap_err();

        assert!(error.is_partial_update());
        assert_eq!(service.code("fn1"), Some(new_code));
        assert_eq!(service.configuration("fn1").unwrap().timeout, 30);
    }

    #[tokio::test]
    async fn failed_code_update_skips_configuration() {
        let service = Arc::new(MemoryFunctionService::new());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);

        let error = manager(service.clone())
            .update(&details("fn1"), &code, true)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            LifecycleError::UpdateCode(FunctionServiceError::NotFound(_))
        ));
        assert_eq!(service.call_count(FunctionOperation::UpdateConfiguration), 0);
    }

    #[tokio::test]
    async fn configuration_update_leaves_code_alone() {
        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v1")));
        manager.create(&details("fn1"), &code).await.unwrap();

        let mut changed = details("fn1");
        changed.handler = String::from("pkg.Other::go");
        manager.update_configuration(&changed).await.unwrap();

        assert_eq!(service.call_count(FunctionOperation::UpdateCode), 0);
        assert_eq!(service.configuration("fn1").unwrap().handler, "pkg.Other::go");
        assert_eq!(service.code("fn1"), Some(code));
    }

    #[tokio::test]
    async fn configuration_is_sent_once_the_code_update_settled() {
        let service = Arc::new(
            MemoryFunctionService::new().with_update_window(Duration::from_millis(50)),
        );
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);
        manager.create(&details("fn1"), &code).await.unwrap();

        let mut changed = details("fn1");
        changed.timeout = 120;
        manager.update(&changed, &code, true).await.unwrap();

        assert_eq!(service.call_count(FunctionOperation::UpdateCode), 1);
        assert_eq!(service.call_count(FunctionOperation::UpdateConfiguration), 1);
        assert_eq!(service.configuration("fn1").unwrap().timeout, 120);

        let rushed = service
            .update_function_code(UpdateFunctionCodeRequest {
                function_name: String::from("fn1"),
                code: code.clone(),
            })
            .await;
        assert!(rushed.is_ok());
        let rushed = service
            .update_function_configuration(FunctionConfigBuilder::new(&changed).build())
            .await;
        assert!(matches!(rushed, Err(FunctionServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn failed_wait_after_code_update_skips_configuration() {
        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);
        manager.create(&details("fn1"), &code).await.unwrap();

        service.fail_next(
            FunctionOperation::WaitUntilReady,
            FunctionServiceError::Service(Box::new(io::Error::new(
                io::ErrorKind::TimedOut,
                "LastUpdateStatus is Failed",
            ))),
        );

        let error = manager.update(&details("fn1"), &code, true).await.unwrap_err();

        assert!(matches!(
            error,
            LifecycleError::UpdateCode(FunctionServiceError::Service(_))
        ));
        assert_eq!(service.call_count(FunctionOperation::UpdateConfiguration), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn configuration_stage_is_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let service = Arc::new(MemoryFunctionService::new());
        let manager = manager(service.clone());
        let code = UploadedCode::new("my-bucket", "fn1.zip", None);
        manager.create(&details("fn1"), &code).await.unwrap();

        manager.update(&details("fn1"), &code, false).await.unwrap();
        assert!(!logs.contents().contains("stage=updating configuration"));

        manager.update(&details("fn1"), &code, true).await.unwrap();
        assert!(logs.contents().contains("stage=updating configuration"));
    }

    /// Delegates to a [`MemoryFunctionService`] but panics on configuration
    /// updates.
    struct PanicsOnConfiguration(MemoryFunctionService);

    #[async_trait]
    impl FunctionService for PanicsOnConfiguration {
        async fn create_function(
            &self,
            request: CreateFunctionRequest,
        ) -> Result<FunctionDescriptor, FunctionServiceError> {
            self.0.create_function(request).await
        }

        async fn update_function_code(
            &self,
            request: UpdateFunctionCodeRequest,
        ) -> Result<FunctionDescriptor, FunctionServiceError> {
            self.0.update_function_code(request).await
        }

        async fn update_function_configuration(
            &self,
            _configuration: FunctionConfiguration,
        ) -> Result<FunctionDescriptor, FunctionServiceError> {
            panic!("configuration handler crashed")
        }

        async fn wait_until_ready(&self, function_name: &str) -> Result<(), FunctionServiceError> {
            self.0.wait_until_ready(function_name).await
        }
    }

    #[tokio::test]
    async fn panic_during_configuration_update_is_a_partial_update() {
        let service = Arc::new(PanicsOnConfiguration(MemoryFunctionService::new()));
        let session = StaticSessionProvider::new(SessionIdentity::new("profile:test", "us-east-1"));
        let manager = FunctionLifecycleManager::new(service.clone(), Arc::new(session));
        let code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v1")));
        manager.create(&details("fn1"), &code).await.unwrap();

        let new_code = UploadedCode::new("my-bucket", "fn1.zip", Some(String::from("v2")));
        let error = manager
            .update(&details("fn1"), &new_code, true)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            LifecycleError::PartialUpdate(FunctionServiceError::Service(_))
        ));
        assert_eq!(service.0.code("fn1"), Some(new_code));
        assert_eq!(
            DeployError::Update(error).stage(),
            DeploymentStage::UpdatingConfiguration
        );
    }
}
