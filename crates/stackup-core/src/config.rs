//! stackup.toml configuration parser.
//!
//! The file carries the project prefix, database credentials, the service
//! topology, and retry tuning. Environment overrides are applied once at
//! load time; components receive the resulting `StackConfig` and never
//! read the environment themselves.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::retry::{RetryPolicy, parse_duration};
use crate::types::{Mode, ServiceRole, StorageBucket};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stackup.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Compose project name; containers are named `<prefix>-<service>-<n>`.
    pub prefix: String,
    /// Alternate compose/topology file.
    pub compose_file: Option<PathBuf>,
    pub mode: Mode,
    /// docker-machine name used to look up the engine IP in local mode.
    pub machine: Option<String>,
    /// Fixed engine host for local mode; skips the docker-machine lookup.
    pub docker_host: Option<String>,
    /// Catalog name suffixes that denote service-discovery records.
    pub discovery_suffixes: Vec<String>,
    /// Timeout applied to each HTTP request.
    pub request_timeout: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            prefix: "tb".to_string(),
            compose_file: None,
            mode: Mode::Local,
            machine: None,
            docker_host: None,
            discovery_suffixes: vec![".service.consul".to_string()],
            request_timeout: "2s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    /// RAM quota per bucket, in MiB.
    pub ram_quota: u32,
    pub replicas: u32,
    pub bucket_type: String,
    pub buckets: Vec<String>,
    /// Port of the query-processing service.
    pub query_port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "Administrator".to_string(),
            password: "password".to_string(),
            ram_quota: 100,
            replicas: 1,
            bucket_type: "couchbase".to_string(),
            buckets: vec![
                "users".to_string(),
                "users_pictures".to_string(),
                "users_publishments".to_string(),
            ],
            query_port: 8093,
        }
    }
}

impl DatabaseConfig {
    /// The buckets to provision, in creation order.
    pub fn storage_buckets(&self) -> Vec<StorageBucket> {
        self.buckets
            .iter()
            .map(|name| StorageBucket {
                name: name.clone(),
                bucket_type: self.bucket_type.clone(),
                ram_quota_mb: self.ram_quota,
                replicas: self.replicas,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service group name in the compose file.
    pub name: String,
    /// Port the service declares inside its container.
    pub port: u16,
    /// Path probed by the readiness gate.
    pub health_path: String,
}

impl ServiceConfig {
    fn new(name: &str, port: u16, health_path: &str) -> Self {
        Self {
            name: name.to_string(),
            port,
            health_path: health_path.to_string(),
        }
    }
}

/// Partial `[services.<role>]` table; unset keys keep the role's default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceOverride {
    name: Option<String>,
    port: Option<u16>,
    health_path: Option<String>,
}

impl ServiceOverride {
    fn apply(self, base: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            name: self.name.unwrap_or(base.name),
            port: self.port.unwrap_or(base.port),
            health_path: self.health_path.unwrap_or(base.health_path),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServicesFile {
    database: ServiceOverride,
    discovery: ServiceOverride,
    app: ServiceOverride,
    proxy: ServiceOverride,
    metrics: ServiceOverride,
}

impl From<ServicesFile> for ServicesConfig {
    fn from(file: ServicesFile) -> Self {
        let base = ServicesConfig::default();
        Self {
            database: file.database.apply(base.database),
            discovery: file.discovery.apply(base.discovery),
            app: file.app.apply(base.app),
            proxy: file.proxy.apply(base.proxy),
            metrics: file.metrics.apply(base.metrics),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ServicesFile")]
pub struct ServicesConfig {
    pub database: ServiceConfig,
    pub discovery: ServiceConfig,
    pub app: ServiceConfig,
    pub proxy: ServiceConfig,
    pub metrics: ServiceConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            database: ServiceConfig::new("db", 8091, "/ui/index.html"),
            discovery: ServiceConfig::new("consul", 8500, "/v1/status/leader"),
            app: ServiceConfig::new("app", 3000, "/"),
            proxy: ServiceConfig::new("proxy", 80, "/"),
            metrics: ServiceConfig::new("metrics", 9090, "/-/healthy"),
        }
    }
}

impl ServicesConfig {
    pub fn get(&self, role: ServiceRole) -> &ServiceConfig {
        match role {
            ServiceRole::Database => &self.database,
            ServiceRole::Discovery => &self.discovery,
            ServiceRole::App => &self.app,
            ServiceRole::Proxy => &self.proxy,
            ServiceRole::Metrics => &self.metrics,
        }
    }

    /// Service group names for every role, in bring-up order.
    pub fn names(&self) -> Vec<String> {
        ServiceRole::ALL
            .iter()
            .map(|role| self.get(*role).name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub app: PathBuf,
    pub proxy: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            app: PathBuf::from("templates/app.ctmpl"),
            proxy: PathBuf::from("templates/proxy.ctmpl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub readiness_interval: String,
    pub publish_interval: String,
    /// Attempts before a gate gives up. 0 retries forever.
    pub max_attempts: u32,
    /// "fixed" or "exponential".
    pub backoff: String,
    /// Cap for exponential backoff.
    pub max_interval: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            readiness_interval: "1300ms".to_string(),
            publish_interval: "1s".to_string(),
            max_attempts: 600,
            backoff: "fixed".to_string(),
            max_interval: "30s".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn readiness_policy(&self) -> ConfigResult<RetryPolicy> {
        self.policy("retry.readiness_interval", &self.readiness_interval)
    }

    pub fn publish_policy(&self) -> ConfigResult<RetryPolicy> {
        self.policy("retry.publish_interval", &self.publish_interval)
    }

    fn policy(&self, field: &'static str, interval: &str) -> ConfigResult<RetryPolicy> {
        let interval = duration_field(field, interval)?;
        let max_attempts = (self.max_attempts > 0).then_some(self.max_attempts);
        match self.backoff.as_str() {
            "fixed" => Ok(RetryPolicy::fixed(interval, max_attempts)),
            "exponential" => {
                let max = duration_field("retry.max_interval", &self.max_interval)?;
                Ok(RetryPolicy::exponential(interval, max, max_attempts))
            }
            other => Err(ConfigError::InvalidValue {
                field: "retry.backoff",
                reason: format!("'{other}' is not one of fixed, exponential"),
            }),
        }
    }
}

fn duration_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidValue {
        field,
        reason: format!("'{value}' is not a duration"),
    })
}

impl StackConfig {
    /// Load, apply process environment overrides, and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StackConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write a default config to `path` for the operator to edit.
    pub fn write_scaffold(path: &Path) -> ConfigResult<()> {
        let body = Self::default().to_toml_string()?;
        std::fs::write(path, body).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `STACKUP_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("STACKUP_PREFIX") {
            self.project.prefix = prefix;
        }
        if let Some(file) = lookup("STACKUP_COMPOSE_FILE") {
            self.project.compose_file = Some(PathBuf::from(file));
        }
        if let Some(mode) = lookup("STACKUP_MODE") {
            self.project.mode = mode.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "STACKUP_MODE",
                reason,
            })?;
        }
        if self.project.docker_host.is_none() {
            self.project.docker_host = lookup("DOCKER_HOST");
        }
        if let Some(user) = lookup("STACKUP_DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("STACKUP_DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(quota) = lookup("STACKUP_DB_RAM_QUOTA") {
            self.database.ram_quota =
                quota.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "STACKUP_DB_RAM_QUOTA",
                    reason: format!("'{quota}' is not a whole number of MiB"),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.project.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "project.prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.database.user.is_empty() || self.database.password.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database",
                reason: "user and password are required".to_string(),
            });
        }
        if self.database.ram_quota == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.ram_quota",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.database.buckets.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.buckets",
                reason: "at least one bucket is required".to_string(),
            });
        }
        for role in ServiceRole::ALL {
            let svc = self.services.get(role);
            if svc.name.is_empty() || svc.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "services",
                    reason: format!("{} needs a name and a non-zero port", role.label()),
                });
            }
        }
        self.request_timeout()?;
        self.retry.readiness_policy()?;
        self.retry.publish_policy()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> ConfigResult<Duration> {
        duration_field("project.request_timeout", &self.project.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = StackConfig::default();
        assert_eq!(config.project.prefix, "tb");
        assert_eq!(config.database.user, "Administrator");
        assert_eq!(config.database.password, "password");
        assert_eq!(config.database.ram_quota, 100);
        assert_eq!(
            config.database.buckets,
            vec!["users", "users_pictures", "users_publishments"]
        );
        config.validate().unwrap();
    }

    #[test]
    fn partial_service_table_keeps_role_defaults() {
        let toml_str = r#"
[services.app]
port = 3001

[services.metrics]
name = "prometheus"
"#;
        let config: StackConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.services.app.port, 3001);
        assert_eq!(config.services.app.name, "app");
        assert_eq!(config.services.app.health_path, "/");
        assert_eq!(config.services.metrics.name, "prometheus");
        assert_eq!(config.services.metrics.port, 9090);
        assert_eq!(config.services.metrics.health_path, "/-/healthy");
        assert_eq!(config.services.database, ServicesConfig::default().database);
        config.validate().unwrap();
    }

    #[test]
    fn parse_minimal() {
        let toml_str = r#"
[project]
prefix = "staging"
mode = "remote"
"#;
        let config: StackConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.prefix, "staging");
        assert_eq!(config.project.mode, Mode::Remote);
        assert_eq!(config.services.app.port, 3000);
    }

    #[test]
    fn scaffold_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        StackConfig::write_scaffold(&path).unwrap();

        let loaded = StackConfig::from_file(&path).unwrap();
        assert_eq!(loaded, StackConfig::default());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = StackConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn env_overrides_credentials_and_quota() {
        let mut config = StackConfig::default();
        config
            .apply_env(env(&[
                ("STACKUP_DB_USER", "ops"),
                ("STACKUP_DB_PASSWORD", "s3cret"),
                ("STACKUP_DB_RAM_QUOTA", "256"),
                ("STACKUP_PREFIX", "qa"),
            ]))
            .unwrap();

        assert_eq!(config.database.user, "ops");
        assert_eq!(config.database.password, "s3cret");
        assert_eq!(config.database.ram_quota, 256);
        assert_eq!(config.project.prefix, "qa");
        let buckets = config.database.storage_buckets();
        assert!(buckets.iter().all(|b| b.ram_quota_mb == 256 && b.replicas == 1));
    }

    #[test]
    fn env_rejects_bad_quota() {
        let mut config = StackConfig::default();
        let err = config
            .apply_env(env(&[("STACKUP_DB_RAM_QUOTA", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("STACKUP_DB_RAM_QUOTA"));
    }

    #[test]
    fn zero_max_attempts_means_unbounded() {
        let mut config = StackConfig::default();
        config.retry.max_attempts = 0;
        let policy = config.retry.readiness_policy().unwrap();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.interval, Duration::from_millis(1300));
    }

    #[test]
    fn unknown_backoff_is_invalid() {
        let mut config = StackConfig::default();
        config.retry.backoff = "random".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_bucket_list_is_invalid() {
        let mut config = StackConfig::default();
        config.database.buckets.clear();
        assert!(config.validate().is_err());
    }
}
