//! In-memory runtime and catalog for tests.
//!
//! `FakeRuntime` records every call into a shared `EventLog` so tests can
//! assert on the order of side effects across components.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stackup_core::ServiceInstance;

use crate::catalog::ServiceCatalog;
use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::{ContainerRuntime, ExecOutput, InstanceInfo};

/// Ordered record of side effects, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().expect("event log").push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().expect("event log").clone()
    }

    /// Position of the first event equal to `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

type ExecHandler = Box<dyn Fn(&[String]) -> ExecOutput + Send + Sync>;

pub struct FakeRuntime {
    log: EventLog,
    instances: HashMap<String, InstanceInfo>,
    exec_handler: Option<ExecHandler>,
    fail_start: Option<String>,
}

impl FakeRuntime {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            instances: HashMap::new(),
            exec_handler: None,
            fail_start: None,
        }
    }

    /// Report `info` for the first instance of `service`.
    pub fn with_instance(mut self, service: &str, info: InstanceInfo) -> Self {
        self.instances.insert(service.to_string(), info);
        self
    }

    pub fn with_exec<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[String]) -> ExecOutput + Send + Sync + 'static,
    {
        self.exec_handler = Some(Box::new(handler));
        self
    }

    /// Make `start(service)` fail.
    pub fn failing_start(mut self, service: &str) -> Self {
        self.fail_start = Some(service.to_string());
        self
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull(&self, services: &[String]) -> RuntimeResult<()> {
        self.log.push(format!("pull {}", services.join(",")));
        Ok(())
    }

    async fn start(&self, service: &str) -> RuntimeResult<()> {
        self.log.push(format!("start {service}"));
        if self.fail_start.as_deref() == Some(service) {
            return Err(RuntimeError::Command {
                command: format!("docker compose up -d {service}"),
                status: 1,
                stderr: "no such service".to_string(),
            });
        }
        Ok(())
    }

    async fn scale(&self, service: &str, count: u32) -> RuntimeResult<()> {
        self.log.push(format!("scale {service} {count}"));
        Ok(())
    }

    async fn down(&self) -> RuntimeResult<()> {
        self.log.push("down");
        Ok(())
    }

    async fn inspect(&self, instance: &ServiceInstance) -> RuntimeResult<InstanceInfo> {
        self.instances
            .get(&instance.service)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(instance.to_string()))
    }

    async fn exec(&self, instance: &ServiceInstance, argv: &[String]) -> RuntimeResult<ExecOutput> {
        let program = argv.first().map(String::as_str).unwrap_or_default();
        let sub = argv.get(1).map(String::as_str).unwrap_or_default();
        self.log
            .push(format!("exec {} {program} {sub}", instance.service));
        Ok(match &self.exec_handler {
            Some(handler) => handler(argv),
            None => ExecOutput::default(),
        })
    }
}

/// Catalog with fixed answers per service name.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    names: HashMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(service: &str, names: &[&str]) -> Arc<Self> {
        let mut catalog = Self::default();
        catalog.names.insert(
            service.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        Arc::new(catalog)
    }
}

#[async_trait]
impl ServiceCatalog for StaticCatalog {
    async fn names(&self, instance: &ServiceInstance) -> Vec<String> {
        self.names.get(&instance.service).cloned().unwrap_or_default()
    }
}
