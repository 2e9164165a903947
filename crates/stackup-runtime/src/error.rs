//! Container runtime error types.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("'{tool}' is not available. {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to decode inspect output for {container}: {reason}")]
    Inspect { container: String, reason: String },

    #[error("no such instance: {0}")]
    NotFound(String),
}
