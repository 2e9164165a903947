//! stackup-runtime — container runtime access and endpoint resolution.
//!
//! # Architecture
//!
//! ```text
//! EndpointResolver (fallback host)
//!   └── AddressResolver, chosen once from Mode
//!         ├── RemoteResolver: ServiceCatalog name → raw IP, declared port
//!         └── LocalResolver:  engine host + published host port
//!
//! ContainerRuntime
//!   └── DockerCompose: `docker compose` / `docker inspect` / `docker exec`
//! ```
//!
//! Instance data comes from `docker inspect` JSON decoded into typed
//! structs; nothing here scrapes free-form CLI text.

pub mod catalog;
pub mod docker;
pub mod error;
pub mod resolver;
pub mod runtime;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{AliasCatalog, ServiceCatalog};
pub use docker::DockerCompose;
pub use error::{RuntimeError, RuntimeResult};
pub use resolver::{AddressResolver, EndpointResolver, LocalResolver, RemoteResolver};
pub use runtime::{ContainerRuntime, ExecOutput, InstanceInfo, PortBinding};
