//! Bootstrap error types.

use std::path::PathBuf;

use thiserror::Error;

use stackup_core::ConfigError;
use stackup_health::{HttpError, ReadinessError};
use stackup_runtime::RuntimeError;

/// Result type alias for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("dependency never became ready: {0}")]
    NotReady(#[from] ReadinessError),

    #[error("failed to read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve an endpoint for {0}")]
    Unresolved(String),

    #[error("bucket {bucket} could not be created: {detail}")]
    BucketCreate { bucket: String, detail: String },

    #[error("bucket {bucket} could not be deleted: {detail}")]
    BucketDelete { bucket: String, detail: String },

    #[error("bucket list failed: {0}")]
    BucketList(String),

    #[error("primary index on {bucket} failed with status {status}: {detail}")]
    Index {
        bucket: String,
        status: u16,
        detail: String,
    },

    #[error("config store never accepted {key}: {source}")]
    Publish {
        key: String,
        #[source]
        source: ReadinessError,
    },
}
