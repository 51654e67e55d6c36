//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur during runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("kubectl execution failed: {0}")]
    ExecutionFailed(String),

    #[error("command `{command}` exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("command `{0}` was cancelled")]
    Cancelled(String),

    #[error("cluster version unavailable: {0}")]
    VersionUnavailable(String),

    #[error("rollout failed for {}", .0.join(", "))]
    RolloutFailed(Vec<String>),

    #[error("Manifest error: {0}")]
    Manifest(#[from] kdeploy_manifest::ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
