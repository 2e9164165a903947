//! Standalone operator tasks that bypass the bootstrap pipeline.

use tracing::{info, warn};

use stackup_core::{Endpoint, ServiceRole};

use crate::error::{BootstrapError, BootstrapResult};
use crate::sequencer::Stack;

/// Rescale a configured service group.
pub async fn scale(stack: &Stack, service: &str, count: u32) -> BootstrapResult<()> {
    let known = stack.config.services.names();
    if !known.iter().any(|name| name == service) {
        return Err(BootstrapError::Precondition(format!(
            "unknown service '{service}' (expected one of: {})",
            known.join(", ")
        )));
    }
    info!(%service, count, "scaling service");
    stack.runtime.scale(service, count).await?;
    Ok(())
}

/// Delete a bucket. Returns `false` when it did not exist.
pub async fn remove_bucket(stack: &Stack, name: &str) -> BootstrapResult<bool> {
    let existing = stack.admin.list_buckets().await?;
    if !existing.iter().any(|b| b == name) {
        warn!(bucket = %name, "bucket does not exist");
        return Ok(false);
    }
    stack.admin.delete_bucket(name).await?;
    info!(bucket = %name, "bucket removed");
    Ok(true)
}

/// Resolve every service's primary endpoint.
pub async fn endpoints(stack: &Stack) -> Vec<(ServiceRole, Endpoint)> {
    let mut out = Vec::new();
    for role in ServiceRole::ALL {
        let port = stack.config.services.get(role).port;
        match stack.endpoint(role, port).await {
            Ok(endpoint) => out.push((role, endpoint)),
            Err(e) => warn!(service = role.label(), error = %e, "no endpoint"),
        }
    }
    out
}

pub async fn down(stack: &Stack) -> BootstrapResult<()> {
    info!(prefix = %stack.config.project.prefix, "stopping stack");
    stack.runtime.down().await?;
    Ok(())
}
