//! Endpoint resolution.
//!
//! The address strategy is picked once from `Mode` when the resolver is
//! built; callers never branch on mode. Resolution is best effort: when no
//! host can be found the resolver degrades to the fallback host instead of
//! failing the run. Every call hits the runtime, so phases resolve once and
//! reuse the result rather than polling.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use stackup_core::{Endpoint, Mode, ServiceInstance};

use crate::catalog::ServiceCatalog;
use crate::runtime::ContainerRuntime;

/// Mode-specific strategy for turning an instance into an endpoint.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    fn mode(&self) -> Mode;

    /// `None` when no host could be determined.
    async fn address(&self, instance: &ServiceInstance, port: u16) -> Option<Endpoint>;
}

/// Remote cluster: catalog name first, raw IP second, declared port as is.
pub struct RemoteResolver {
    catalog: Arc<dyn ServiceCatalog>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl RemoteResolver {
    pub fn new(catalog: Arc<dyn ServiceCatalog>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { catalog, runtime }
    }
}

#[async_trait]
impl AddressResolver for RemoteResolver {
    fn mode(&self) -> Mode {
        Mode::Remote
    }

    async fn address(&self, instance: &ServiceInstance, port: u16) -> Option<Endpoint> {
        if let Some(name) = self.catalog.names(instance).await.into_iter().next() {
            debug!(%instance, host = %name, "resolved via catalog");
            return Endpoint::new(name, port);
        }

        match self.runtime.inspect(instance).await {
            Ok(info) => {
                let ip = info.ip?;
                debug!(%instance, host = %ip, "resolved via raw IP");
                Endpoint::new(ip, port)
            }
            Err(e) => {
                debug!(%instance, error = %e, "raw IP lookup failed");
                None
            }
        }
    }
}

/// Local development: the engine's host address plus the host port the
/// runtime published for the container port.
pub struct LocalResolver {
    runtime: Arc<dyn ContainerRuntime>,
    engine_host: String,
}

impl LocalResolver {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, engine_host: &str) -> Self {
        Self {
            runtime,
            engine_host: engine_host.to_string(),
        }
    }
}

#[async_trait]
impl AddressResolver for LocalResolver {
    fn mode(&self) -> Mode {
        Mode::Local
    }

    async fn address(&self, instance: &ServiceInstance, port: u16) -> Option<Endpoint> {
        let info = match self.runtime.inspect(instance).await {
            Ok(info) => info,
            Err(e) => {
                debug!(%instance, error = %e, "inspect failed");
                return None;
            }
        };
        match info.host_port(port) {
            Some(host_port) => Endpoint::new(self.engine_host.as_str(), host_port),
            None => {
                debug!(%instance, port, "port not published; using declared port");
                Endpoint::new(self.engine_host.as_str(), port)
            }
        }
    }
}

/// Resolves logical service names to endpoints, never failing hard.
pub struct EndpointResolver {
    strategy: Box<dyn AddressResolver>,
    fallback_host: String,
}

impl EndpointResolver {
    pub fn new(strategy: Box<dyn AddressResolver>, fallback_host: &str) -> Self {
        Self {
            strategy,
            fallback_host: fallback_host.to_string(),
        }
    }

    /// Build the strategy for `mode`. `engine_host` only matters locally.
    pub fn for_mode(
        mode: Mode,
        runtime: Arc<dyn ContainerRuntime>,
        catalog: Arc<dyn ServiceCatalog>,
        engine_host: &str,
    ) -> Self {
        let strategy: Box<dyn AddressResolver> = match mode {
            Mode::Remote => Box::new(RemoteResolver::new(catalog, runtime)),
            Mode::Local => Box::new(LocalResolver::new(runtime, engine_host)),
        };
        Self::new(strategy, "127.0.0.1")
    }

    pub fn mode(&self) -> Mode {
        self.strategy.mode()
    }

    /// Endpoint for the first instance of `service`. Falls back to the
    /// local machine when nothing resolves; `None` only for port 0.
    pub async fn resolve(&self, service: &str, port: u16) -> Option<Endpoint> {
        let instance = ServiceInstance::first(service);
        if let Some(endpoint) = self.strategy.address(&instance, port).await {
            return Some(endpoint);
        }
        warn!(%service, fallback = %self.fallback_host, "no address resolved; using fallback");
        Endpoint::new(self.fallback_host.as_str(), port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AliasCatalog;
    use crate::runtime::{InstanceInfo, PortBinding};
    use crate::testing::{EventLog, FakeRuntime, StaticCatalog};

    fn app_info() -> InstanceInfo {
        InstanceInfo {
            container: "tb-app-1".to_string(),
            ip: Some("172.18.0.4".to_string()),
            dns_names: vec!["app".to_string()],
            ports: vec![PortBinding {
                container_port: 3000,
                host_ip: "0.0.0.0".to_string(),
                host_port: 32768,
            }],
        }
    }

    fn runtime() -> Arc<FakeRuntime> {
        Arc::new(FakeRuntime::new(EventLog::default()).with_instance("app", app_info()))
    }

    #[tokio::test]
    async fn local_mode_uses_published_host_port() {
        let resolver =
            EndpointResolver::for_mode(Mode::Local, runtime(), StaticCatalog::empty(), "192.168.99.100");
        let ep = resolver.resolve("app", 3000).await.unwrap();
        assert_eq!(ep.address(), "192.168.99.100:32768");
    }

    #[tokio::test]
    async fn remote_mode_prefers_catalog_name() {
        let catalog = StaticCatalog::with("app", &["app.service.consul"]);
        let resolver = EndpointResolver::for_mode(Mode::Remote, runtime(), catalog, "unused");
        let ep = resolver.resolve("app", 3000).await.unwrap();
        assert_eq!(ep.address(), "app.service.consul:3000");
    }

    #[tokio::test]
    async fn remote_mode_falls_back_to_raw_ip() {
        let rt = runtime();
        let catalog = Arc::new(AliasCatalog::new(rt.clone(), vec![".service.consul".to_string()]));
        let resolver = EndpointResolver::for_mode(Mode::Remote, rt, catalog, "unused");

        let ep = resolver.resolve("app", 3000).await.unwrap();
        assert_eq!(ep.host(), "172.18.0.4");
        assert_eq!(ep.port(), 3000);
    }

    #[tokio::test]
    async fn unresolvable_service_degrades_to_local_machine() {
        let resolver =
            EndpointResolver::for_mode(Mode::Remote, runtime(), StaticCatalog::empty(), "unused");
        let ep = resolver.resolve("ghost", 8500).await.unwrap();
        assert_eq!(ep.address(), "127.0.0.1:8500");
    }

    #[tokio::test]
    async fn local_mode_unpublished_port_passes_through() {
        let resolver =
            EndpointResolver::for_mode(Mode::Local, runtime(), StaticCatalog::empty(), "10.0.0.5");
        let ep = resolver.resolve("app", 9229).await.unwrap();
        assert_eq!(ep.address(), "10.0.0.5:9229");
    }

    #[tokio::test]
    async fn strategy_is_fixed_at_construction() {
        let local =
            EndpointResolver::for_mode(Mode::Local, runtime(), StaticCatalog::empty(), "h");
        let remote =
            EndpointResolver::for_mode(Mode::Remote, runtime(), StaticCatalog::empty(), "h");
        assert_eq!(local.mode(), Mode::Local);
        assert_eq!(remote.mode(), Mode::Remote);
    }
}
