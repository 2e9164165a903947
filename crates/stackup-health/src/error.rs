//! Error types for HTTP calls and readiness gates.

use thiserror::Error;

use crate::checker::ProbeResult;

/// Errors from a single HTTP exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: hyper::Error,
    },

    #[error("request to {uri} failed: {source}")]
    Request {
        uri: String,
        #[source]
        source: hyper::Error,
    },

    #[error("invalid request: {0}")]
    Invalid(#[from] http::Error),

    #[error("request to {uri} timed out")]
    Timeout { uri: String },
}

/// A readiness gate ran out of attempts.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("{target} never became ready after {attempts} attempts (last: {last:?})")]
    NeverReady {
        target: String,
        attempts: u32,
        last: ProbeResult,
    },
}
