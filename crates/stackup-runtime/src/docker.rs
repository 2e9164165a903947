//! Docker compose runtime.
//!
//! Drives the `docker` CLI:
//! 1. `docker compose -p <prefix> [-f <file>] pull|up|down` for service groups
//! 2. `docker inspect <container>` decoded into typed structs for addresses
//! 3. `docker exec <container> ...` for in-container admin tools
//!
//! Requires `docker` with the compose plugin on `$PATH`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use stackup_core::ServiceInstance;

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::{ContainerRuntime, ExecOutput, InstanceInfo, PortBinding};

#[derive(Debug, Clone)]
pub struct DockerCompose {
    docker: PathBuf,
    prefix: String,
    compose_file: Option<PathBuf>,
    /// Engine every command targets; `None` leaves the inherited env alone.
    docker_host: Option<String>,
}

impl DockerCompose {
    pub fn new(prefix: &str, compose_file: Option<PathBuf>) -> Self {
        Self {
            docker: PathBuf::from("docker"),
            prefix: prefix.to_string(),
            compose_file,
            docker_host: None,
        }
    }

    /// Target the engine at `host` (a `DOCKER_HOST` value).
    pub fn with_docker_host(mut self, host: Option<String>) -> Self {
        self.docker_host = host.filter(|h| !h.trim().is_empty());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn docker_host(&self) -> Option<&str> {
        self.docker_host.as_deref()
    }

    fn docker(&self) -> Command {
        let mut cmd = Command::new(&self.docker);
        if let Some(host) = &self.docker_host {
            cmd.env("DOCKER_HOST", host);
        }
        cmd
    }

    fn compose(&self) -> Command {
        let mut cmd = self.docker();
        cmd.arg("compose").arg("-p").arg(&self.prefix);
        if let Some(file) = &self.compose_file {
            cmd.arg("-f").arg(file);
        }
        cmd
    }

    /// Run to completion, forwarding output lines to the log. Non-zero exit
    /// is an error.
    async fn run(&self, mut cmd: Command) -> RuntimeResult<ExecOutput> {
        let output = capture(&mut cmd).await?;
        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "stackup::docker", "{line}");
        }
        if !output.success() {
            return Err(RuntimeError::Command {
                command: describe(&cmd),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn pull(&self, services: &[String]) -> RuntimeResult<()> {
        let mut cmd = self.compose();
        cmd.arg("pull").args(services);
        info!(services = ?services, "pulling images");
        self.run(cmd).await.map(|_| ())
    }

    async fn start(&self, service: &str) -> RuntimeResult<()> {
        let mut cmd = self.compose();
        cmd.args(["up", "-d", service]);
        info!(%service, "starting service");
        self.run(cmd).await.map(|_| ())
    }

    async fn scale(&self, service: &str, count: u32) -> RuntimeResult<()> {
        let mut cmd = self.compose();
        cmd.args(["up", "-d", "--no-recreate", "--scale"])
            .arg(format!("{service}={count}"))
            .arg(service);
        info!(%service, count, "scaling service");
        self.run(cmd).await.map(|_| ())
    }

    async fn down(&self) -> RuntimeResult<()> {
        let mut cmd = self.compose();
        cmd.arg("down");
        info!(project = %self.prefix, "removing services");
        self.run(cmd).await.map(|_| ())
    }

    async fn inspect(&self, instance: &ServiceInstance) -> RuntimeResult<InstanceInfo> {
        let container = instance.container_name(&self.prefix);
        let mut cmd = self.docker();
        cmd.arg("inspect").arg(&container);

        let output = capture(&mut cmd).await?;
        if !output.success() {
            debug!(%container, stderr = %output.stderr.trim(), "inspect failed");
            return Err(RuntimeError::NotFound(container));
        }
        parse_inspect(&container, &output.stdout)
    }

    async fn exec(&self, instance: &ServiceInstance, argv: &[String]) -> RuntimeResult<ExecOutput> {
        let container = instance.container_name(&self.prefix);
        let mut cmd = self.docker();
        cmd.arg("exec").arg(&container).args(argv);
        debug!(%container, program = ?argv.first(), "exec");
        capture(&mut cmd).await
    }
}

/// Verify a CLI tool is installed by running `<tool> --version`.
pub async fn require_tool(tool: &str, hint: &str) -> RuntimeResult<()> {
    require_command(tool, &["--version"], hint).await
}

/// Verify `docker compose` works, not just `docker`.
pub async fn require_compose(hint: &str) -> RuntimeResult<()> {
    require_command("docker", &["compose", "version"], hint).await
}

async fn require_command(program: &str, args: &[&str], hint: &str) -> RuntimeResult<()> {
    let result = Command::new(program).args(args).output().await;
    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(_) | Err(_) => {
            let mut tool = vec![program];
            tool.extend(args.iter().copied().filter(|a| !a.starts_with('-') && *a != "version"));
            Err(RuntimeError::MissingTool {
                tool: tool.join(" "),
                hint: hint.to_string(),
            })
        }
    }
}

/// Address of the engine behind a docker-machine.
pub async fn machine_ip(machine: &str) -> RuntimeResult<String> {
    let mut cmd = Command::new("docker-machine");
    cmd.arg("ip").arg(machine);
    let output = capture(&mut cmd).await?;
    let ip = output.stdout.trim().to_string();
    if !output.success() || ip.is_empty() {
        return Err(RuntimeError::Command {
            command: describe(&cmd),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(ip)
}

/// Address services are published on in local mode.
///
/// An explicit `docker_host` (a `DOCKER_HOST` URL or a bare host) wins,
/// then the named docker-machine, then the local machine.
pub async fn engine_host(docker_host: Option<&str>, machine: Option<&str>) -> String {
    if let Some(value) = docker_host {
        if value.contains("://") {
            if let Some(host) = host_from_docker_host(value) {
                return host;
            }
        } else if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    if let Some(machine) = machine {
        match machine_ip(machine).await {
            Ok(ip) => return ip,
            Err(e) => warn!(%machine, error = %e, "docker-machine lookup failed"),
        }
    }
    "127.0.0.1".to_string()
}

/// Host part of a `DOCKER_HOST` value. Unix sockets mean a local engine.
pub fn host_from_docker_host(value: &str) -> Option<String> {
    let rest = value
        .trim()
        .strip_prefix("tcp://")
        .or_else(|| value.trim().strip_prefix("ssh://"))?;
    let rest = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
    let host = rest.split(['/', ':']).next()?.trim();
    (!host.is_empty()).then(|| host.to_string())
}

async fn capture(cmd: &mut Command) -> RuntimeResult<ExecOutput> {
    let output = cmd.output().await.map_err(|source| RuntimeError::Spawn {
        command: describe(cmd),
        source,
    })?;
    Ok(ExecOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn describe(cmd: &Command) -> String {
    let std = cmd.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().into_owned()];
    parts.extend(std.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

// ── docker inspect ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    #[serde(default)]
    config: Option<ContainerConfig>,
    #[serde(default)]
    network_settings: Option<NetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerConfig {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    domainname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
    #[serde(default)]
    ports: HashMap<String, Option<Vec<HostBinding>>>,
    #[serde(default)]
    networks: HashMap<String, NetworkEndpoint>,
}

#[derive(Debug, Deserialize)]
struct HostBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

#[derive(Debug, Deserialize)]
struct NetworkEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
    #[serde(rename = "Aliases", default)]
    aliases: Option<Vec<String>>,
    #[serde(rename = "DNSNames", default)]
    dns_names: Option<Vec<String>>,
}

fn parse_inspect(container: &str, json: &str) -> RuntimeResult<InstanceInfo> {
    let decoded: Vec<ContainerInspect> =
        serde_json::from_str(json).map_err(|e| RuntimeError::Inspect {
            container: container.to_string(),
            reason: e.to_string(),
        })?;
    let inspect = decoded
        .into_iter()
        .next()
        .ok_or_else(|| RuntimeError::NotFound(container.to_string()))?;

    let mut info = InstanceInfo {
        container: container.to_string(),
        ..Default::default()
    };

    if let Some(config) = &inspect.config {
        if !config.domainname.is_empty() && !config.hostname.is_empty() {
            info.dns_names
                .push(format!("{}.{}", config.hostname, config.domainname));
        }
    }

    if let Some(settings) = inspect.network_settings {
        let mut networks: Vec<_> = settings.networks.into_iter().collect();
        networks.sort_by(|a, b| a.0.cmp(&b.0));

        info.ip = Some(settings.ip_address)
            .filter(|ip| !ip.is_empty())
            .or_else(|| {
                networks
                    .iter()
                    .map(|(_, n)| n.ip_address.clone())
                    .find(|ip| !ip.is_empty())
            });

        for (_, net) in &networks {
            let names = net.aliases.iter().chain(net.dns_names.iter()).flatten();
            for name in names {
                if !info.dns_names.contains(name) {
                    info.dns_names.push(name.clone());
                }
            }
        }

        for (key, bindings) in settings.ports {
            let Some(container_port) = key.split('/').next().and_then(|p| p.parse::<u16>().ok())
            else {
                continue;
            };
            for binding in bindings.into_iter().flatten() {
                if let Ok(host_port) = binding.host_port.parse::<u16>() {
                    info.ports.push(PortBinding {
                        container_port,
                        host_ip: binding.host_ip,
                        host_port,
                    });
                }
            }
        }
        info.ports
            .sort_by_key(|b| (b.container_port, b.host_ip.clone()));
    }

    Ok(info)
}
