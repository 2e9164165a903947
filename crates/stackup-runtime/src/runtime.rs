//! The container runtime seam.

use async_trait::async_trait;

use stackup_core::ServiceInstance;

use crate::error::RuntimeResult;

/// One published port of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_ip: String,
    pub host_port: u16,
}

/// What the runtime reports about a running instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInfo {
    pub container: String,
    /// Raw IP on the container network, if any.
    pub ip: Option<String>,
    /// Every DNS-style name the instance is published under.
    pub dns_names: Vec<String>,
    pub ports: Vec<PortBinding>,
}

impl InstanceInfo {
    /// Host port published for `container_port`, if any.
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|b| b.container_port == container_port)
            .map(|b| b.host_port)
    }
}

/// Output of a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Starts, stops, and inspects named service groups.
///
/// stackup never owns instance lifecycles; it asks the runtime to act and
/// reads back what the runtime reports.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull the latest images for the given service groups.
    async fn pull(&self, services: &[String]) -> RuntimeResult<()>;

    /// Start (or create) a service group in the background.
    async fn start(&self, service: &str) -> RuntimeResult<()>;

    /// Rescale a service group to `count` instances.
    async fn scale(&self, service: &str, count: u32) -> RuntimeResult<()>;

    /// Stop and remove every service group in the project.
    async fn down(&self) -> RuntimeResult<()>;

    async fn inspect(&self, instance: &ServiceInstance) -> RuntimeResult<InstanceInfo>;

    /// Run a command inside the instance. A non-zero exit is returned in
    /// `ExecOutput`, not raised.
    async fn exec(&self, instance: &ServiceInstance, argv: &[String]) -> RuntimeResult<ExecOutput>;
}
