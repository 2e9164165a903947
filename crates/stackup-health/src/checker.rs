//! Probe logic.
//!
//! A probe performs one readiness check and classifies the outcome. The
//! `PollTracker` accumulates outcomes for one gate and decides how long to
//! wait before the next attempt.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use stackup_core::{Endpoint, RetryPolicy};

use crate::client::{HttpRequest, send};
use crate::error::HttpError;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The dependency answered with success.
    Ready,
    /// The dependency answered, but not with success (non-2xx).
    NotReady,
    /// The probe could not be executed (connection refused, timeout).
    Failed,
}

impl ProbeResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeResult::Ready)
    }
}

impl From<Result<bool, HttpError>> for ProbeResult {
    fn from(result: Result<bool, HttpError>) -> Self {
        match result {
            Ok(true) => ProbeResult::Ready,
            Ok(false) => ProbeResult::NotReady,
            Err(_) => ProbeResult::Failed,
        }
    }
}

/// One readiness check against a dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Human-readable target used in logs and errors.
    fn target(&self) -> String;

    async fn check(&self) -> ProbeResult;
}

/// `GET <path>`; any 2xx means ready.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    endpoint: Endpoint,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(endpoint: Endpoint, path: &str, timeout: Duration) -> Self {
        Self {
            endpoint,
            path: path.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn target(&self) -> String {
        self.endpoint.url(&self.path)
    }

    async fn check(&self) -> ProbeResult {
        let req = HttpRequest::get(&self.endpoint, &self.path);
        match send(req, self.timeout).await {
            Ok(resp) if resp.is_success() => ProbeResult::Ready,
            Ok(resp) => {
                debug!(status = %resp.status, target = %self.target(), "probe non-2xx");
                ProbeResult::NotReady
            }
            Err(e) => {
                debug!(error = %e, target = %self.target(), "probe failed");
                ProbeResult::Failed
            }
        }
    }
}

/// Tracks attempts for a single readiness gate.
#[derive(Debug)]
pub struct PollTracker {
    policy: RetryPolicy,
    attempts: u32,
    last: Option<ProbeResult>,
}

impl PollTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            last: None,
        }
    }

    /// Record a probe result; returns the attempt number it belonged to.
    pub fn record(&mut self, result: ProbeResult) -> u32 {
        self.attempts += 1;
        self.last = Some(result);
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last(&self) -> Option<ProbeResult> {
        self.last
    }

    pub fn is_ready(&self) -> bool {
        self.last.is_some_and(|r| r.is_ready())
    }

    /// The attempt budget is spent and the last attempt was not ready.
    pub fn exhausted(&self) -> bool {
        !self.is_ready() && !self.policy.allows(self.attempts)
    }

    /// Delay before the next attempt.
    pub fn next_interval(&self) -> Duration {
        self.policy.delay_for(self.attempts.max(1))
    }
}
