//! Database cluster administration.
//!
//! Bucket management goes through the cluster's own admin CLI run inside
//! the database container, so no published port is needed. Index creation
//! goes to the query service over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use stackup_core::{Endpoint, QueryIndex, ServiceInstance, StorageBucket};
use stackup_health::{HttpRequest, Probe, ProbeResult, send};
use stackup_runtime::{ContainerRuntime, ExecOutput};

use crate::error::{BootstrapError, BootstrapResult};

/// Query-service error code for "index already exists".
const INDEX_EXISTS_CODE: i64 = 4300;

/// What happened to a `CREATE PRIMARY INDEX` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    /// The bucket already had a primary index; nothing changed.
    AlreadyExists,
}

#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Administrative no-op. `Ok(true)` once the admin interface accepts
    /// authenticated commands.
    async fn ping(&self) -> BootstrapResult<bool>;

    async fn list_buckets(&self) -> BootstrapResult<Vec<String>>;

    /// Create a bucket and wait until the cluster has provisioned it.
    async fn create_bucket(&self, bucket: &StorageBucket) -> BootstrapResult<()>;

    async fn delete_bucket(&self, name: &str) -> BootstrapResult<()>;

    /// Create the primary index for `index.bucket` via the query service at `query`.
    async fn create_index(&self, query: &Endpoint, index: &QueryIndex)
    -> BootstrapResult<IndexOutcome>;
}

/// Couchbase: `couchbase-cli` through `docker exec`, N1QL over HTTP.
pub struct CouchbaseAdmin {
    runtime: Arc<dyn ContainerRuntime>,
    instance: ServiceInstance,
    /// Cluster address as seen from inside the container.
    cluster: String,
    user: String,
    password: String,
    timeout: Duration,
}

impl CouchbaseAdmin {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        service: &str,
        admin_port: u16,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            instance: ServiceInstance::first(service),
            cluster: format!("localhost:{admin_port}"),
            user: user.to_string(),
            password: password.to_string(),
            timeout,
        }
    }

    fn cli(&self, subcommand: &str) -> Vec<String> {
        vec![
            "couchbase-cli".to_string(),
            subcommand.to_string(),
            "-c".to_string(),
            self.cluster.clone(),
            "-u".to_string(),
            self.user.clone(),
            "-p".to_string(),
            self.password.clone(),
        ]
    }

    async fn exec(&self, argv: Vec<String>) -> BootstrapResult<ExecOutput> {
        Ok(self.runtime.exec(&self.instance, &argv).await?)
    }
}

#[async_trait]
impl DatabaseAdmin for CouchbaseAdmin {
    async fn ping(&self) -> BootstrapResult<bool> {
        let out = self.exec(self.cli("server-info")).await?;
        Ok(out.success())
    }

    async fn list_buckets(&self) -> BootstrapResult<Vec<String>> {
        let out = self.exec(self.cli("bucket-list")).await?;
        if !out.success() {
            return Err(BootstrapError::BucketList(detail(&out)));
        }
        Ok(parse_bucket_list(&out.stdout))
    }

    async fn create_bucket(&self, bucket: &StorageBucket) -> BootstrapResult<()> {
        let mut argv = self.cli("bucket-create");
        argv.extend([
            "--bucket".to_string(),
            bucket.name.clone(),
            "--bucket-type".to_string(),
            bucket.bucket_type.clone(),
            "--bucket-ramsize".to_string(),
            bucket.ram_quota_mb.to_string(),
            "--bucket-replica".to_string(),
            bucket.replicas.to_string(),
            "--wait".to_string(),
        ]);

        info!(bucket = %bucket.name, ram_mb = bucket.ram_quota_mb, "creating bucket");
        let out = self.exec(argv).await?;
        if out.success() {
            return Ok(());
        }
        let detail = detail(&out);
        if detail.contains("already exists") {
            warn!(bucket = %bucket.name, "bucket already exists");
            return Ok(());
        }
        Err(BootstrapError::BucketCreate {
            bucket: bucket.name.clone(),
            detail,
        })
    }

    async fn delete_bucket(&self, name: &str) -> BootstrapResult<()> {
        let mut argv = self.cli("bucket-delete");
        argv.extend(["--bucket".to_string(), name.to_string()]);

        info!(bucket = %name, "deleting bucket");
        let out = self.exec(argv).await?;
        if !out.success() {
            return Err(BootstrapError::BucketDelete {
                bucket: name.to_string(),
                detail: detail(&out),
            });
        }
        Ok(())
    }

    async fn create_index(
        &self,
        query: &Endpoint,
        index: &QueryIndex,
    ) -> BootstrapResult<IndexOutcome> {
        let statement = index.statement();
        let body = serde_json::json!({ "statement": statement }).to_string();
        let req = HttpRequest::post(query, "/query/service")
            .basic_auth(&self.user, &self.password)
            .header("content-type", "application/json")
            .body(body);

        info!(bucket = %index.bucket, "creating primary index");
        let resp = send(req, self.timeout).await?;
        let outcome = classify_query_response(resp.status.as_u16(), &resp.text());
        match &outcome {
            Ok(IndexOutcome::AlreadyExists) => {
                info!(bucket = %index.bucket, "primary index already exists")
            }
            Ok(IndexOutcome::Created) => debug!(bucket = %index.bucket, "primary index created"),
            Err(_) => {}
        }
        outcome.map_err(|(status, detail)| BootstrapError::Index {
            bucket: index.bucket.clone(),
            status,
            detail,
        })
    }
}

/// Admin-interface readiness gate backed by `DatabaseAdmin::ping`.
pub struct AdminProbe {
    admin: Arc<dyn DatabaseAdmin>,
}

impl AdminProbe {
    pub fn new(admin: Arc<dyn DatabaseAdmin>) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl Probe for AdminProbe {
    fn target(&self) -> String {
        "database admin interface".to_string()
    }

    async fn check(&self) -> ProbeResult {
        match self.admin.ping().await {
            Ok(true) => ProbeResult::Ready,
            Ok(false) => ProbeResult::NotReady,
            Err(e) => {
                debug!(error = %e, "admin ping failed");
                ProbeResult::Failed
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

fn classify_query_response(status: u16, body: &str) -> Result<IndexOutcome, (u16, String)> {
    let parsed: Option<QueryResponse> = serde_json::from_str(body).ok();

    if (200..300).contains(&status) && parsed.as_ref().is_none_or(|r| r.errors.is_empty()) {
        return Ok(IndexOutcome::Created);
    }

    if let Some(resp) = &parsed {
        let exists = resp
            .errors
            .iter()
            .any(|e| e.code == INDEX_EXISTS_CODE || e.msg.contains("already exists"));
        if exists {
            return Ok(IndexOutcome::AlreadyExists);
        }
        if !resp.errors.is_empty() {
            let msgs: Vec<String> = resp
                .errors
                .iter()
                .map(|e| format!("[{}] {}", e.code, e.msg))
                .collect();
            return Err((status, msgs.join("; ")));
        }
        return Err((status, format!("query status {}", resp.status)));
    }

    Err((status, body.trim().to_string()))
}

/// Bucket names from `couchbase-cli bucket-list`: unindented lines.
fn parse_bucket_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(char::is_whitespace))
        .map(|line| line.trim().to_string())
        .collect()
}

fn detail(out: &ExecOutput) -> String {
    let stderr = out.stderr.trim();
    let stdout = out.stdout.trim();
    match (stderr.is_empty(), stdout.is_empty()) {
        (false, _) => stderr.to_string(),
        (true, false) => stdout.to_string(),
        (true, true) => format!("exit status {}", out.status),
    }
}
