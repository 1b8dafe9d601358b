use crate::consts::ARCHIVE_EXTENSION;
use std::future::Future;
use tokio::task::JoinError;
use tracing::Instrument;

/// `<function-name>.zip`
pub fn archive_key(function_name: &str) -> String {
    format!("{function_name}{ARCHIVE_EXTENSION}")
}

/// Parses a `KEY=VALUE` pair. The value may itself contain `=`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;

    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }

    Ok((key.to_string(), value.to_string()))
}

/// Runs a stage on the runtime's worker pool and waits for its result.
///
/// The current span follows the task. A panicking task surfaces as `E`.
pub(crate) async fn spawn_stage<T, E, F>(future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    match tokio::spawn(future.in_current_span()).await {
        Ok(result) => result,
        Err(error) => Err(E::from(error)),
    }
}
