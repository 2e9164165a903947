//! Blocks a phase until a probe succeeds or the retry budget runs out.

use tracing::{info, warn};

use stackup_core::RetryPolicy;

use crate::checker::{PollTracker, Probe};
use crate::error::ReadinessError;

/// Runs a probe at the policy's interval until it reports ready or the
/// attempt budget is spent.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    policy: RetryPolicy,
}

impl ReadinessPoller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wait for `probe` to become ready. Returns the number of attempts
    /// made, which is exactly the attempt that succeeded.
    pub async fn wait<P>(&self, probe: &P) -> Result<u32, ReadinessError>
    where
        P: Probe + ?Sized,
    {
        let target = probe.target();
        let mut tracker = PollTracker::new(self.policy);

        loop {
            let result = probe.check().await;
            let attempt = tracker.record(result);

            if result.is_ready() {
                info!(%target, attempts = attempt, "ready");
                return Ok(attempt);
            }

            // One progress marker per attempt.
            info!(%target, attempt, ?result, "waiting");

            if tracker.exhausted() {
                warn!(%target, attempts = attempt, "gave up waiting");
                return Err(ReadinessError::NeverReady {
                    target,
                    attempts: attempt,
                    last: result,
                });
            }

            tokio::time::sleep(tracker.next_interval()).await;
        }
    }
}
