use crate::{
    consts::FUNCTION_READY_TIMEOUT_SECS,
    errors::FunctionServiceError,
    function_config::FunctionConfiguration,
    request::{CreateFunctionRequest, UpdateFunctionCodeRequest},
    types::{FunctionDescriptor, TracingMode},
};
use async_trait::async_trait;
use aws_sdk_lambda::{
    client::Waiters,
    error::ProvideErrorMetadata,
    types::{
        Environment, FunctionCode, Runtime, TracingConfig, TracingMode as LambdaTracingMode,
    },
    Client,
};
use std::{collections::HashMap, time::Duration};

/// Remote function-management service.
///
/// Implementations are shared by every running deployment, so they must not
/// keep per-request state.
#[async_trait]
pub trait FunctionService: Send + Sync {
    async fn create_function(
        &self,
        request: CreateFunctionRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError>;

    async fn update_function_code(
        &self,
        request: UpdateFunctionCodeRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError>;

    async fn update_function_configuration(
        &self,
        configuration: FunctionConfiguration,
    ) -> Result<FunctionDescriptor, FunctionServiceError>;

    /// Resolves once the function is active and done applying the last
    /// accepted change.
    ///
    /// The calls above return as soon as the change is accepted. Another
    /// change sent before this resolves is rejected as a conflict.
    async fn wait_until_ready(&self, function_name: &str) -> Result<(), FunctionServiceError>;
}

impl From<aws_sdk_lambda::Error> for FunctionServiceError {
    fn from(error: aws_sdk_lambda::Error) -> Self {
        let message = error.message().unwrap_or_default().to_string();
        match error.code() {
            Some("InvalidParameterValueException") => FunctionServiceError::InvalidParameter(message),
            Some("ResourceConflictException") => FunctionServiceError::Conflict(message),
            Some("ResourceNotFoundException") => FunctionServiceError::NotFound(message),
            Some("AccessDeniedException") => FunctionServiceError::AccessDenied(message),
            Some("TooManyRequestsException") => FunctionServiceError::Throttled(message),
            _ => FunctionServiceError::Service(Box::new(error)),
        }
    }
}

/// Every lambda operation answers with the same function configuration
/// shape, but as distinct output types.
macro_rules! descriptor_from_output {
    ($output:expr) => {{
        let output = $output;
        FunctionDescriptor {
            name: output
                .function_name()
                .ok_or(FunctionServiceError::MalformedResponse("FunctionName"))?
                .to_string(),
            arn: output
                .function_arn()
                .ok_or(FunctionServiceError::MalformedResponse("FunctionArn"))?
                .to_string(),
            description: output.description().unwrap_or_default().to_string(),
            handler: output.handler().unwrap_or_default().to_string(),
            runtime: output
                .runtime()
                .map(|runtime| runtime.as_str().to_string())
                .unwrap_or_default(),
            role_arn: output
                .role()
                .ok_or(FunctionServiceError::MalformedResponse("Role"))?
                .to_string(),
            timeout: from_sdk_int(output.timeout()),
            memory_size: from_sdk_int(output.memory_size()),
            env_vars: output
                .environment()
                .and_then(|environment| environment.variables())
                .map(|variables| {
                    variables
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            tracing_mode: match output.tracing_config().and_then(|config| config.mode()) {
                Some(LambdaTracingMode::Active) => TracingMode::Active,
                _ => TracingMode::PassThrough,
            },
            last_modified: output.last_modified().map(ToString::to_string),
            code_sha256: output.code_sha256().map(ToString::to_string),
        }
    }};
}

fn to_sdk_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_sdk_int(value: Option<i32>) -> u32 {
    value
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_default()
}

fn to_environment(variables: &std::collections::BTreeMap<String, String>) -> Environment {
    let variables: HashMap<String, String> = variables
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

fn to_tracing_config(mode: TracingMode) -> TracingConfig {
    let mode = match mode {
        TracingMode::Active => LambdaTracingMode::Active,
        TracingMode::PassThrough => LambdaTracingMode::PassThrough,
    };
    TracingConfig::builder().mode(mode).build()
}

/// [`FunctionService`] backed by the AWS Lambda control plane.
#[derive(Clone)]
pub struct AwsLambdaClient {
    client: Client,
}

impl AwsLambdaClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl FunctionService for AwsLambdaClient {
    async fn create_function(
        &self,
        request: CreateFunctionRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let CreateFunctionRequest {
            configuration,
            code,
        } = request;

        let function_code = FunctionCode::builder()
            .s3_bucket(code.bucket)
            .s3_key(code.key)
            .set_s3_object_version(code.version)
            .build();

        let output = self
            .client
            .create_function()
            .function_name(&configuration.function_name)
            .description(&configuration.description)
            .handler(&configuration.handler)
            .role(&configuration.role)
            .runtime(Runtime::from(configuration.runtime.as_str()))
            .timeout(to_sdk_int(configuration.timeout))
            .memory_size(to_sdk_int(configuration.memory_size))
            .environment(to_environment(&configuration.environment))
            .tracing_config(to_tracing_config(configuration.tracing_mode))
            .code(function_code)
            .send()
            .await
            .map_err(|error| FunctionServiceError::from(aws_sdk_lambda::Error::from(error)))?;

        Ok(descriptor_from_output!(&output))
    }

    async fn update_function_code(
        &self,
        request: UpdateFunctionCodeRequest,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let output = self
            .client
            .update_function_code()
            .function_name(request.function_name)
            .s3_bucket(request.code.bucket)
            .s3_key(request.code.key)
            .set_s3_object_version(request.code.version)
            .send()
            .await
            .map_err(|error| FunctionServiceError::from(aws_sdk_lambda::Error::from(error)))?;

        Ok(descriptor_from_output!(&output))
    }

    async fn update_function_configuration(
        &self,
        configuration: FunctionConfiguration,
    ) -> Result<FunctionDescriptor, FunctionServiceError> {
        let output = self
            .client
            .update_function_configuration()
            .function_name(&configuration.function_name)
            .description(&configuration.description)
            .handler(&configuration.handler)
            .role(&configuration.role)
            .runtime(Runtime::from(configuration.runtime.as_str()))
            .timeout(to_sdk_int(configuration.timeout))
            .memory_size(to_sdk_int(configuration.memory_size))
            .environment(to_environment(&configuration.environment))
            .tracing_config(to_tracing_config(configuration.tracing_mode))
            .send()
            .await
            .map_err(|error| FunctionServiceError::from(aws_sdk_lambda::Error::from(error)))?;

        Ok(descriptor_from_output!(&output))
    }

    async fn wait_until_ready(&self, function_name: &str) -> Result<(), FunctionServiceError> {
        let max_wait = Duration::from_secs(FUNCTION_READY_TIMEOUT_SECS);

        tracing::debug!(function = %function_name, ?max_wait, "Waiting for function to settle.");

        self.client
            .wait_until_function_active_v2()
            .function_name(function_name)
            .wait(max_wait)
            .await
            .map_err(|error| FunctionServiceError::Service(Box::new(error)))?;

        self.client
            .wait_until_function_updated_v2()
            .function_name(function_name)
            .wait(max_wait)
            .await
            .map_err(|error| FunctionServiceError::Service(Box::new(error)))?;

        Ok(())
    }
}
