//! Domain types shared across stackup crates.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How service endpoints are reached from the machine running stackup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Services run on a local (or docker-machine) engine; ports are
    /// reached through the container's published host-port table.
    #[default]
    Local,
    /// Services run on a remote cluster and are reachable on their
    /// declared port directly.
    Remote,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => write!(f, "local"),
            Mode::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "remote" => Ok(Mode::Remote),
            other => Err(format!("unknown mode '{other}' (expected local or remote)")),
        }
    }
}

/// The fixed roles in the deployment topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Database,
    Discovery,
    App,
    Proxy,
    Metrics,
}

impl ServiceRole {
    /// Every role, in the order services are brought up.
    pub const ALL: [ServiceRole; 5] = [
        ServiceRole::Database,
        ServiceRole::Discovery,
        ServiceRole::App,
        ServiceRole::Proxy,
        ServiceRole::Metrics,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceRole::Database => "database",
            ServiceRole::Discovery => "discovery",
            ServiceRole::App => "app",
            ServiceRole::Proxy => "proxy",
            ServiceRole::Metrics => "metrics",
        }
    }
}

/// A logical service name plus its ordinal within the service group.
///
/// stackup never owns an instance's lifecycle; it only observes what the
/// container runtime reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceInstance {
    pub service: String,
    pub ordinal: u32,
}

impl ServiceInstance {
    pub fn new(service: &str, ordinal: u32) -> Self {
        Self {
            service: service.to_string(),
            ordinal,
        }
    }

    /// The first instance of a service group.
    pub fn first(service: &str) -> Self {
        Self::new(service, 1)
    }

    /// Container name under the compose naming scheme `<prefix>-<service>-<n>`.
    pub fn container_name(&self, prefix: &str) -> String {
        format!("{}-{}-{}", prefix, self.service, self.ordinal)
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.service, self.ordinal)
    }
}

/// A resolved `(host, port)` pair.
///
/// Only constructible with a non-empty host and a non-zero port. Endpoints
/// are recomputed on each lookup and never cached across a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Option<Self> {
        let host = host.into();
        let host = host.trim();
        if host.is_empty() || port == 0 {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for a TCP connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// An `http://` URL for the given path on this endpoint.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{}{}", self.address(), path)
        } else {
            format!("http://{}/{}", self.address(), path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A named, quota-bounded storage partition in the database cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBucket {
    pub name: String,
    pub bucket_type: String,
    pub ram_quota_mb: u32,
    pub replicas: u32,
}

impl StorageBucket {
    pub fn new(name: &str, ram_quota_mb: u32, replicas: u32) -> Self {
        Self {
            name: name.to_string(),
            bucket_type: "couchbase".to_string(),
            ram_quota_mb,
            replicas,
        }
    }
}

/// A primary index bound to exactly one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIndex {
    pub bucket: String,
}

impl QueryIndex {
    pub fn primary(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
        }
    }

    /// The declarative statement sent to the query service.
    pub fn statement(&self) -> String {
        format!("CREATE PRIMARY INDEX ON `{}`", self.bucket)
    }
}

/// A template body published to the config store for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    pub service: String,
    pub body: Vec<u8>,
}

impl ConfigTemplate {
    pub fn new(service: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            service: service.to_string(),
            body: body.into(),
        }
    }

    /// Read the template's raw bytes from a local file.
    pub fn from_file(service: &str, path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        Ok(Self::new(service, body))
    }

    /// Store key the consuming service reads at startup.
    pub fn key(&self) -> String {
        format!("{}/template", self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_rejects_empty_host() {
        assert!(Endpoint::new("", 8091).is_none());
        assert!(Endpoint::new("   ", 8091).is_none());
    }

    #[test]
    fn endpoint_rejects_zero_port() {
        assert!(Endpoint::new("10.0.0.4", 0).is_none());
    }

    #[test]
    fn endpoint_formats_address_and_url() {
        let ep = Endpoint::new("192.168.99.100", 32768).unwrap();
        assert_eq!(ep.address(), "192.168.99.100:32768");
        assert_eq!(ep.url("/query/service"), "http://192.168.99.100:32768/query/service");
        assert_eq!(ep.url("v1/kv"), "http://192.168.99.100:32768/v1/kv");
    }

    #[test]
    fn container_name_follows_compose_scheme() {
        let inst = ServiceInstance::first("db");
        assert_eq!(inst.container_name("tb"), "tb-db-1");
        assert_eq!(inst.to_string(), "db #1");
    }

    #[test]
    fn primary_index_statement_quotes_bucket() {
        let idx = QueryIndex::primary("users_pictures");
        assert_eq!(idx.statement(), "CREATE PRIMARY INDEX ON `users_pictures`");
    }

    #[test]
    fn template_key_is_derived_from_service() {
        let tpl = ConfigTemplate::new("proxy", b"server {}".to_vec());
        assert_eq!(tpl.key(), "proxy/template");
    }

    #[test]
    fn template_reads_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ctmpl");
        std::fs::write(&path, b"{{ key \"db\" }}\n").unwrap();

        let tpl = ConfigTemplate::from_file("app", &path).unwrap();
        assert_eq!(tpl.body, b"{{ key \"db\" }}\n");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Remote".parse::<Mode>().unwrap(), Mode::Remote);
        assert_eq!("local".parse::<Mode>().unwrap(), Mode::Local);
        assert!("cloud".parse::<Mode>().is_err());
    }
}
