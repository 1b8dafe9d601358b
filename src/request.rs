use crate::{function_config::FunctionConfiguration, types::UploadedCode};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFunctionRequest {
    pub configuration: FunctionConfiguration,
    /// code is the stored archive the function is created from
    pub code: UploadedCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFunctionCodeRequest {
    /// Name of deployed function
    pub function_name: String,
    pub code: UploadedCode,
}
