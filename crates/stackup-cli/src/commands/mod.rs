pub mod init;
pub mod ops;
pub mod up;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{error, info};

use stackup_bootstrap::{CouchbaseAdmin, ConsulKv, Stack};
use stackup_core::{ConfigError, Mode, StackConfig};
use stackup_runtime::docker::{engine_host, require_compose, require_tool};
use stackup_runtime::{AliasCatalog, ContainerRuntime, DockerCompose, EndpointResolver};

/// Load the stack config. A missing file gets a scaffold written in its
/// place and fails the run so the operator can edit and rerun.
pub fn load_config(path: &Path) -> anyhow::Result<StackConfig> {
    match StackConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::Missing(_)) => {
            StackConfig::write_scaffold(path)?;
            error!(
                path = %path.display(),
                "no config found; wrote a default one. Set the database credentials and rerun"
            );
            bail!("{} was missing", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", path.display())),
    }
}

/// Config-level checks that need no tooling.
pub fn check_layout(config: &StackConfig, need_templates: bool) -> anyhow::Result<()> {
    if config.project.mode == Mode::Remote && config.project.docker_host.is_none() {
        bail!(
            "remote mode needs a cluster engine: set DOCKER_HOST or project.docker_host, \
             or switch project.mode to \"local\""
        );
    }
    if need_templates {
        for path in [&config.templates.app, &config.templates.proxy] {
            if !path.is_file() {
                bail!(
                    "template {} not found; create it or point [templates] at the right file",
                    path.display()
                );
            }
        }
    }
    Ok(())
}

/// Required tools on PATH.
pub async fn check_tools(config: &StackConfig) -> anyhow::Result<()> {
    require_tool("docker", "install Docker").await?;
    require_compose("install the Docker compose plugin (`docker compose version` must work)").await?;
    if config.project.mode == Mode::Local && config.project.machine.is_some() {
        require_tool(
            "docker-machine",
            "install docker-machine or remove project.machine to use the local engine",
        )
        .await?;
    }
    Ok(())
}

/// The compose runtime, pointed at the configured engine.
pub fn runtime_for(config: &StackConfig) -> DockerCompose {
    let project = &config.project;
    DockerCompose::new(&project.prefix, project.compose_file.clone())
        .with_docker_host(project.docker_host.clone())
}

/// Wire the real runtime, resolver, admin, and store for `config`.
pub async fn build_stack(config: StackConfig) -> anyhow::Result<Stack> {
    let project = &config.project;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(runtime_for(&config));
    let catalog = Arc::new(AliasCatalog::new(
        runtime.clone(),
        project.discovery_suffixes.clone(),
    ));

    let host = match project.mode {
        Mode::Local => engine_host(project.docker_host.as_deref(), project.machine.as_deref()).await,
        Mode::Remote => "127.0.0.1".to_string(),
    };
    info!(mode = %project.mode, prefix = %project.prefix, engine = %host, "stack configured");
    let resolver = EndpointResolver::for_mode(project.mode, runtime.clone(), catalog, &host);

    let timeout = config.request_timeout()?;
    let db = &config.services.database;
    let admin = CouchbaseAdmin::new(
        runtime.clone(),
        &db.name,
        db.port,
        &config.database.user,
        &config.database.password,
        timeout,
    );

    Ok(Stack {
        runtime,
        resolver: Arc::new(resolver),
        admin: Arc::new(admin),
        store: Arc::new(ConsulKv::new(timeout)),
        config: Arc::new(config),
    })
}

/// Load, check, and wire in one go.
pub async fn prepare(path: &Path, need_templates: bool) -> anyhow::Result<Stack> {
    let config = load_config(path)?;
    check_layout(&config, need_templates)?;
    check_tools(&config).await?;
    build_stack(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_writes_scaffold_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stackup.toml");

        assert!(load_config(&path).is_err());
        assert!(path.is_file());

        let written = StackConfig::from_file(&path).unwrap();
        assert_eq!(written, StackConfig::default());
    }

    #[test]
    fn remote_mode_without_engine_is_rejected() {
        let mut config = StackConfig::default();
        config.project.mode = Mode::Remote;
        let err = check_layout(&config, false).unwrap_err();
        assert!(err.to_string().contains("DOCKER_HOST"));

        config.project.docker_host = Some("tcp://10.0.0.7:2376".to_string());
        check_layout(&config, false).unwrap();
    }

    #[test]
    fn runtime_targets_configured_engine() {
        let mut config = StackConfig::default();
        config.project.mode = Mode::Remote;
        config.project.docker_host = Some("tcp://10.0.0.7:2376".to_string());

        let runtime = runtime_for(&config);
        assert_eq!(runtime.docker_host(), Some("tcp://10.0.0.7:2376"));
        assert_eq!(runtime.prefix(), "tb");
    }

    #[test]
    fn missing_template_is_rejected_for_up() {
        let mut config = StackConfig::default();
        config.templates.app = "nope/app.ctmpl".into();
        assert!(check_layout(&config, true).is_err());
        check_layout(&config, false).unwrap();
    }

    #[test]
    fn present_templates_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StackConfig::default();
        config.templates.app = dir.path().join("app.ctmpl");
        config.templates.proxy = dir.path().join("proxy.ctmpl");
        std::fs::write(&config.templates.app, "a").unwrap();
        std::fs::write(&config.templates.proxy, "p").unwrap();
        check_layout(&config, true).unwrap();
    }
}
