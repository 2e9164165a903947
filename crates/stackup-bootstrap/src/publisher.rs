//! Publishes service config templates to the config store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use stackup_core::{ConfigTemplate, Endpoint};
use stackup_health::{Probe, ProbeResult, ReadinessPoller};

use crate::error::{BootstrapError, BootstrapResult};
use crate::store::ConfigStore;

/// Writes a template under its service key, retrying until the store
/// accepts it.
pub struct ConfigPublisher {
    store: Arc<dyn ConfigStore>,
    poller: ReadinessPoller,
}

impl ConfigPublisher {
    pub fn new(store: Arc<dyn ConfigStore>, poller: ReadinessPoller) -> Self {
        Self { store, poller }
    }

    /// Publish `template` to the store at `endpoint`. Returns the attempt
    /// on which the write was accepted.
    pub async fn publish(
        &self,
        endpoint: &Endpoint,
        template: &ConfigTemplate,
    ) -> BootstrapResult<u32> {
        let key = template.key();
        info!(%key, store = %endpoint, bytes = template.body.len(), "publishing template");

        let probe = StoreWriteProbe {
            store: self.store.as_ref(),
            endpoint,
            key: &key,
            value: &template.body,
        };
        let attempts = self
            .poller
            .wait(&probe)
            .await
            .map_err(|source| BootstrapError::Publish {
                key: key.clone(),
                source,
            })?;

        info!(%key, attempts, "template published");
        Ok(attempts)
    }
}

/// A single store write treated as a readiness check.
struct StoreWriteProbe<'a> {
    store: &'a dyn ConfigStore,
    endpoint: &'a Endpoint,
    key: &'a str,
    value: &'a [u8],
}

#[async_trait]
impl Probe for StoreWriteProbe<'_> {
    fn target(&self) -> String {
        format!("{} on {}", self.key, self.endpoint)
    }

    async fn check(&self) -> ProbeResult {
        let result = self.store.put(self.endpoint, self.key, self.value).await;
        if let Err(e) = &result {
            debug!(key = %self.key, error = %e, "store write failed");
        }
        ProbeResult::from(result)
    }
}
