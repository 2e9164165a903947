//! The fixed bootstrap pipeline.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use stackup_core::{ConfigTemplate, Endpoint, ServiceRole, StackConfig};
use stackup_health::{HttpProbe, ReadinessPoller};
use stackup_runtime::{ContainerRuntime, EndpointResolver};

use crate::admin::DatabaseAdmin;
use crate::database::{DatabaseBootstrapper, DatabaseReport};
use crate::error::{BootstrapError, BootstrapResult};
use crate::publisher::ConfigPublisher;
use crate::store::ConfigStore;

/// Everything a run talks to, built once at startup.
#[derive(Clone)]
pub struct Stack {
    pub config: Arc<StackConfig>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub resolver: Arc<EndpointResolver>,
    pub admin: Arc<dyn DatabaseAdmin>,
    pub store: Arc<dyn ConfigStore>,
}

impl Stack {
    /// Resolve the first instance of `role` on `port`.
    pub(crate) async fn endpoint(&self, role: ServiceRole, port: u16) -> BootstrapResult<Endpoint> {
        let name = &self.config.services.get(role).name;
        self.resolver
            .resolve(name, port)
            .await
            .ok_or_else(|| BootstrapError::Unresolved(name.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PullImages,
    StartDatabase,
    ShowEndpoints,
    BootstrapDatabase,
    StartApplication,
    StartProxy,
    StartMetrics,
}

impl Phase {
    /// Execution order.
    pub const ALL: [Phase; 7] = [
        Phase::PullImages,
        Phase::StartDatabase,
        Phase::ShowEndpoints,
        Phase::BootstrapDatabase,
        Phase::StartApplication,
        Phase::StartProxy,
        Phase::StartMetrics,
    ];

    /// 1-based position in the pipeline.
    pub fn step(&self) -> usize {
        *self as usize + 1
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::PullImages => "pull-images",
            Phase::StartDatabase => "start-database",
            Phase::ShowEndpoints => "show-endpoints",
            Phase::BootstrapDatabase => "bootstrap-database",
            Phase::StartApplication => "start-application",
            Phase::StartProxy => "start-proxy",
            Phase::StartMetrics => "start-metrics",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub phases: Vec<Phase>,
    /// Dashboard endpoints shown in phase 3.
    pub endpoints: Vec<(String, Endpoint)>,
    pub database: Option<DatabaseReport>,
    /// Store key → attempts needed to publish it.
    pub published: Vec<(String, u32)>,
}

pub struct Sequencer {
    stack: Stack,
    readiness: ReadinessPoller,
    publisher: ConfigPublisher,
    timeout: Duration,
}

impl Sequencer {
    pub fn new(stack: Stack) -> BootstrapResult<Self> {
        let readiness = ReadinessPoller::new(stack.config.retry.readiness_policy()?);
        let publish = ReadinessPoller::new(stack.config.retry.publish_policy()?);
        let timeout = stack.config.request_timeout()?;
        let publisher = ConfigPublisher::new(stack.store.clone(), publish);
        Ok(Self {
            stack,
            readiness,
            publisher,
            timeout,
        })
    }

    /// Run every phase in order. The first error aborts the run.
    pub async fn run(&self) -> BootstrapResult<RunReport> {
        let mut report = RunReport::default();
        for phase in Phase::ALL {
            info!(%phase, step = phase.step(), "phase started");
            if let Err(e) = self.execute(phase, &mut report).await {
                error!(%phase, error = %e, "phase failed");
                return Err(e);
            }
            report.phases.push(phase);
        }
        info!(phases = report.phases.len(), "stack is up");
        Ok(report)
    }

    async fn execute(&self, phase: Phase, report: &mut RunReport) -> BootstrapResult<()> {
        let config = &self.stack.config;
        let services = &config.services;
        match phase {
            Phase::PullImages => {
                self.stack.runtime.pull(&services.names()).await?;
            }
            Phase::StartDatabase => {
                self.stack.runtime.start(&services.discovery.name).await?;
                self.stack.runtime.start(&services.database.name).await?;
            }
            Phase::ShowEndpoints => {
                report.endpoints = self.dashboards().await;
            }
            Phase::BootstrapDatabase => {
                let http = self
                    .stack
                    .endpoint(ServiceRole::Database, services.database.port)
                    .await?;
                let query = self
                    .stack
                    .endpoint(ServiceRole::Database, config.database.query_port)
                    .await?;
                let bootstrapper = DatabaseBootstrapper::new(
                    self.stack.admin.clone(),
                    self.readiness,
                    self.timeout,
                );
                let db = bootstrapper
                    .run(
                        &http,
                        &services.database.health_path,
                        &query,
                        &config.database.storage_buckets(),
                    )
                    .await?;
                report.database = Some(db);
            }
            Phase::StartApplication => {
                let published = self
                    .publish_and_start(ServiceRole::App, &config.templates.app)
                    .await?;
                report.published.push(published);
            }
            Phase::StartProxy => {
                let published = self
                    .publish_and_start(ServiceRole::Proxy, &config.templates.proxy)
                    .await?;
                report.published.push(published);
                self.gate(ServiceRole::Proxy).await?;
            }
            Phase::StartMetrics => {
                self.stack.runtime.start(&services.metrics.name).await?;
                self.gate(ServiceRole::Metrics).await?;
            }
        }
        Ok(())
    }

    /// Discovery and database dashboards. Failures only warn.
    async fn dashboards(&self) -> Vec<(String, Endpoint)> {
        let services = &self.stack.config.services;
        let wanted = [
            (ServiceRole::Discovery, "/ui"),
            (ServiceRole::Database, "/ui/index.html"),
        ];

        let mut shown = Vec::new();
        for (role, path) in wanted {
            let port = services.get(role).port;
            match self.stack.endpoint(role, port).await {
                Ok(endpoint) => {
                    info!(service = role.label(), url = %endpoint.url(path), "dashboard");
                    shown.push((role.label().to_string(), endpoint));
                }
                Err(e) => warn!(service = role.label(), error = %e, "dashboard unavailable"),
            }
        }
        shown
    }

    /// Publish the service's template, then start it. The start is never
    /// issued unless the store accepted the template.
    async fn publish_and_start(
        &self,
        role: ServiceRole,
        template_path: &Path,
    ) -> BootstrapResult<(String, u32)> {
        let name = &self.stack.config.services.get(role).name;
        let template = ConfigTemplate::from_file(name, template_path).map_err(|source| {
            BootstrapError::Template {
                path: template_path.to_path_buf(),
                source,
            }
        })?;

        let store = self
            .stack
            .endpoint(
                ServiceRole::Discovery,
                self.stack.config.services.discovery.port,
            )
            .await?;
        let attempts = self.publisher.publish(&store, &template).await?;

        self.stack.runtime.start(name).await?;
        Ok((template.key(), attempts))
    }

    async fn gate(&self, role: ServiceRole) -> BootstrapResult<u32> {
        let svc = self.stack.config.services.get(role);
        let endpoint = self.stack.endpoint(role, svc.port).await?;
        let probe = HttpProbe::new(endpoint, &svc.health_path, self.timeout);
        Ok(self.readiness.wait(&probe).await?)
    }
}
