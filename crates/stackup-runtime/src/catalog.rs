//! Service catalog lookup.
//!
//! Maps an instance to the DNS-style names it is published under,
//! keeping only names that denote service-discovery records
//! (e.g. `app.service.consul`).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use stackup_core::ServiceInstance;

use crate::runtime::ContainerRuntime;

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Discovery names for the instance, most preferred first. Empty when
    /// the catalog has no record.
    async fn names(&self, instance: &ServiceInstance) -> Vec<String>;
}

/// Catalog backed by the names the runtime reports for an instance.
pub struct AliasCatalog {
    runtime: Arc<dyn ContainerRuntime>,
    suffixes: Vec<String>,
}

impl AliasCatalog {
    /// `suffixes` are in preference order.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, suffixes: Vec<String>) -> Self {
        Self { runtime, suffixes }
    }
}

#[async_trait]
impl ServiceCatalog for AliasCatalog {
    async fn names(&self, instance: &ServiceInstance) -> Vec<String> {
        let info = match self.runtime.inspect(instance).await {
            Ok(info) => info,
            Err(e) => {
                debug!(%instance, error = %e, "catalog lookup failed");
                return Vec::new();
            }
        };
        filter_discovery_names(&info.dns_names, &self.suffixes)
    }
}

/// Keep names ending in one of `suffixes`, ordered by suffix preference.
pub fn filter_discovery_names(names: &[String], suffixes: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for suffix in suffixes {
        for name in names {
            let name = name.trim_end_matches('.');
            if name.len() > suffix.len() && name.ends_with(suffix.as_str()) {
                let name = name.to_string();
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
    }
    out
}
