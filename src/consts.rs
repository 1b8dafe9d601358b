use const_format::concatcp;

pub const BUCKET_ENV_VAR: &str = "LAMBDA_DEPLOY_BUCKET";
pub const PACKAGE_DIR_ENV_VAR: &str = "LAMBDA_DEPLOY_PACKAGE_DIR";
pub const PROFILE_ENV_VAR: &str = "AWS_PROFILE";
pub const REGION_ENV_VAR: &str = "AWS_REGION";

pub const DEFAULT_PROFILE: &str = "default";

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

pub const DEFAULT_LOG_FILTER: &str = concatcp!(PKG_NAME, "=info");

/// Extension appended to the function name to form the object key.
pub const ARCHIVE_EXTENSION: &str = ".zip";

pub const DEFAULT_TIMEOUT_SECS: u32 = 60;
pub const MIN_TIMEOUT_SECS: u32 = 1;
pub const MAX_TIMEOUT_SECS: u32 = 900;

pub const DEFAULT_MEMORY_SIZE_MB: u32 = 128;
pub const MIN_MEMORY_SIZE_MB: u32 = 128;
pub const MAX_MEMORY_SIZE_MB: u32 = 10_240;

/// How long to wait for a function to finish applying a change.
pub const FUNCTION_READY_TIMEOUT_SECS: u64 = 300;
