use crate::{
    request::{CreateFunctionRequest, UpdateFunctionCodeRequest},
    types::{FunctionUploadDetails, TracingMode, UploadedCode},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime configuration of a function, as sent to the function-management
/// service on create and on configuration update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub description: String,
    pub handler: String,
    pub role: String,
    pub runtime: String,
    pub timeout: u32,
    pub memory_size: u32,
    pub environment: BTreeMap<String, String>,
    pub tracing_mode: TracingMode,
}

pub struct FunctionConfigBuilder<'a> {
    details: &'a FunctionUploadDetails,
}

impl<'a> FunctionConfigBuilder<'a> {
    pub fn new(details: &'a FunctionUploadDetails) -> Self {
        Self { details }
    }

    pub fn build(&self) -> FunctionConfiguration {
        FunctionConfiguration::from(self)
    }

    pub fn to_create_request(&self, code: &UploadedCode) -> CreateFunctionRequest {
        CreateFunctionRequest {
            configuration: self.build(),
            code: code.clone(),
        }
    }

    pub fn to_update_code_request(&self, code: &UploadedCode) -> UpdateFunctionCodeRequest {
        UpdateFunctionCodeRequest {
            function_name: self.details.name.clone(),
            code: code.clone(),
        }
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.build())
    }
}

impl From<&FunctionConfigBuilder<'_>> for FunctionConfiguration {
    fn from(value: &FunctionConfigBuilder<'_>) -> Self {
        let details = value.details;
        FunctionConfiguration {
            function_name: details.name.clone(),
            description: details.description.clone(),
            handler: details.handler.clone(),
            role: details.role_arn.clone(),
            runtime: details.runtime.clone(),
            timeout: details.timeout,
            memory_size: details.memory_size,
            environment: details.env_vars.clone(),
            tracing_mode: details.tracing_mode,
        }
    }
}
