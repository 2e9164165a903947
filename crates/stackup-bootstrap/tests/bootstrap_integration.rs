//! End-to-end bootstrap runs against in-memory runtime fakes.
//!
//! The container runtime is faked; every HTTP dependency (node API, query
//! service, config store, proxy, metrics) is a canned local listener
//! reached through the published-port table, as in local mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stackup_bootstrap::*;
use stackup_core::{Endpoint, Mode, ServiceRole, StackConfig};
use stackup_health::HttpError;
use stackup_health::testing::CannedServer;
use stackup_runtime::testing::{EventLog, FakeRuntime, StaticCatalog};
use stackup_runtime::{EndpointResolver, ExecOutput, InstanceInfo, PortBinding};

/// Real `ConsulKv` that also records each write's outcome in the event log.
struct LoggedStore {
    inner: ConsulKv,
    log: EventLog,
}

#[async_trait]
impl ConfigStore for LoggedStore {
    async fn put(&self, endpoint: &Endpoint, key: &str, value: &[u8]) -> Result<bool, HttpError> {
        let result = self.inner.put(endpoint, key, value).await;
        let verdict = match &result {
            Ok(true) => "accepted",
            _ => "refused",
        };
        self.log.push(format!("put {key} {verdict}"));
        result
    }
}

struct Servers {
    node: CannedServer,
    query: CannedServer,
    kv: CannedServer,
    proxy: CannedServer,
    metrics: CannedServer,
}

impl Servers {
    async fn start(kv_script: Vec<(u16, String)>) -> Self {
        Self {
            node: CannedServer::start(vec![(200, "<html>".to_string())]).await,
            query: CannedServer::start(vec![(200, r#"{"status":"success"}"#.to_string())]).await,
            kv: CannedServer::start(kv_script).await,
            proxy: CannedServer::start(vec![(200, "welcome".to_string())]).await,
            metrics: CannedServer::start(vec![(200, "Healthy.".to_string())]).await,
        }
    }
}

fn published(pairs: &[(u16, &CannedServer)]) -> InstanceInfo {
    InstanceInfo {
        ports: pairs
            .iter()
            .map(|(container_port, server)| PortBinding {
                container_port: *container_port,
                host_ip: "0.0.0.0".to_string(),
                host_port: server.endpoint().port(),
            })
            .collect(),
        ..Default::default()
    }
}

fn couchbase_cli(existing: &'static str) -> impl Fn(&[String]) -> ExecOutput + Send + Sync {
    move |argv| match argv.get(1).map(String::as_str) {
        Some("bucket-list") => ExecOutput {
            stdout: existing.to_string(),
            ..Default::default()
        },
        _ => ExecOutput::default(),
    }
}

struct Harness {
    log: EventLog,
    stack: Stack,
    _templates: tempfile::TempDir,
}

fn harness(servers: &Servers, runtime: FakeRuntime, max_attempts: u32) -> Harness {
    let log = runtime.log().clone();
    let runtime = Arc::new(
        runtime
            .with_instance("db", published(&[(8091, &servers.node), (8093, &servers.query)]))
            .with_instance("consul", published(&[(8500, &servers.kv)]))
            .with_instance("proxy", published(&[(80, &servers.proxy)]))
            .with_instance("metrics", published(&[(9090, &servers.metrics)])),
    );

    let templates = tempfile::tempdir().unwrap();
    let app = templates.path().join("app.ctmpl");
    let proxy = templates.path().join("proxy.ctmpl");
    std::fs::write(&app, "DB_HOST={{ key \"db/host\" }}").unwrap();
    std::fs::write(&proxy, "upstream app { server app:3000; }").unwrap();

    let mut config = StackConfig::default();
    config.project.mode = Mode::Local;
    config.templates.app = app;
    config.templates.proxy = proxy;
    config.retry.readiness_interval = "10ms".to_string();
    config.retry.publish_interval = "10ms".to_string();
    config.retry.max_attempts = max_attempts;

    let resolver =
        EndpointResolver::for_mode(Mode::Local, runtime.clone(), StaticCatalog::empty(), "127.0.0.1");
    let admin = CouchbaseAdmin::new(
        runtime.clone(),
        "db",
        8091,
        &config.database.user,
        &config.database.password,
        Duration::from_secs(2),
    );
    let store = LoggedStore {
        inner: ConsulKv::new(Duration::from_secs(2)),
        log: log.clone(),
    };

    Harness {
        log,
        stack: Stack {
            config: Arc::new(config),
            runtime,
            resolver: Arc::new(resolver),
            admin: Arc::new(admin),
            store: Arc::new(store),
        },
        _templates: templates,
    }
}

fn position(log: &EventLog, event: &str) -> usize {
    log.position(event)
        .unwrap_or_else(|| panic!("missing event {event:?} in {:?}", log.events()))
}

#[tokio::test]
async fn fresh_run_reaches_every_phase() {
    let servers = Servers::start(vec![
        (500, "No cluster leader".to_string()),
        (200, "true".to_string()),
    ])
    .await;
    let runtime = FakeRuntime::new(EventLog::default()).with_exec(couchbase_cli(""));
    let h = harness(&servers, runtime, 50);

    let report = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap();

    assert_eq!(report.phases, Phase::ALL.to_vec());
    assert_eq!(h.log.events()[0], "pull db,consul,app,proxy,metrics");
    assert!(position(&h.log, "start consul") < position(&h.log, "start db"));

    // Store refused once during leader election, then accepted.
    assert!(position(&h.log, "put app/template refused") < position(&h.log, "put app/template accepted"));
    assert_eq!(report.published[0], ("app/template".to_string(), 2));
    assert_eq!(report.published[1], ("proxy/template".to_string(), 1));

    let kv_requests = servers.kv.requests().await;
    assert_eq!(kv_requests.last().unwrap().path, "/v1/kv/proxy/template");
    assert_eq!(
        kv_requests.last().unwrap().body_text(),
        "upstream app { server app:3000; }"
    );

    let dashboards: Vec<&str> = report.endpoints.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(dashboards, vec!["discovery", "database"]);

    let metrics = servers.metrics.requests().await;
    assert_eq!(metrics[0].path, "/-/healthy");
    assert!(!servers.proxy.requests().await.is_empty());
}

#[tokio::test]
async fn publish_always_precedes_service_start() {
    let servers = Servers::start(vec![
        (500, "No cluster leader".to_string()),
        (500, "No cluster leader".to_string()),
        (200, "true".to_string()),
    ])
    .await;
    let runtime = FakeRuntime::new(EventLog::default()).with_exec(couchbase_cli(""));
    let h = harness(&servers, runtime, 50);

    Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap();

    for service in ["app", "proxy"] {
        let published = position(&h.log, &format!("put {service}/template accepted"));
        let started = position(&h.log, &format!("start {service}"));
        assert!(published < started, "{service} started before its template was published");
    }
}

#[tokio::test]
async fn database_gets_three_buckets_then_three_indexes() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default()).with_exec(couchbase_cli(""));
    let h = harness(&servers, runtime, 50);

    let report = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap();

    let creates: Vec<String> = h
        .log
        .events()
        .into_iter()
        .filter(|e| e == "exec db couchbase-cli bucket-create")
        .collect();
    assert_eq!(creates.len(), 3);

    let statements: Vec<String> = servers
        .query
        .requests()
        .await
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["statement"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        statements,
        vec![
            "CREATE PRIMARY INDEX ON `users`",
            "CREATE PRIMARY INDEX ON `users_pictures`",
            "CREATE PRIMARY INDEX ON `users_publishments`",
        ]
    );

    let db = report.database.unwrap();
    assert_eq!(db.created, vec!["users", "users_pictures", "users_publishments"]);
}

#[tokio::test]
async fn rerun_skips_buckets_that_exist() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default())
        .with_exec(couchbase_cli("users\n bucketType: membase\nusers_pictures\n bucketType: membase\n"));
    let h = harness(&servers, runtime, 50);

    let report = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap();
    let db = report.database.unwrap();
    assert_eq!(db.created, vec!["users_publishments"]);
    assert_eq!(db.skipped, vec!["users", "users_pictures"]);
    assert_eq!(db.indexes.len(), 3);
}

#[tokio::test]
async fn store_that_never_accepts_stops_before_app_start() {
    let servers = Servers::start(vec![(500, "No cluster leader".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default()).with_exec(couchbase_cli(""));
    let h = harness(&servers, runtime, 3);

    let err = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Publish { ref key, .. } if key == "app/template"));
    assert!(h.log.position("start app").is_none());
    assert_eq!(servers.kv.requests().await.len(), 3);
}

#[tokio::test]
async fn failed_start_aborts_remaining_phases() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default())
        .with_exec(couchbase_cli(""))
        .failing_start("consul");
    let h = harness(&servers, runtime, 50);

    let err = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Runtime(_)));
    assert!(h.log.position("start db").is_none());
    assert!(servers.node.requests().await.is_empty());
}

#[tokio::test]
async fn missing_template_is_reported_with_path() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default()).with_exec(couchbase_cli(""));
    let mut h = harness(&servers, runtime, 50);

    let mut config = (*h.stack.config).clone();
    config.templates.app = "does/not/exist.ctmpl".into();
    h.stack.config = Arc::new(config);

    let err = Sequencer::new(h.stack.clone()).unwrap().run().await.unwrap_err();
    assert!(err.to_string().contains("does/not/exist.ctmpl"));
    assert!(h.log.position("start app").is_none());
}

#[tokio::test]
async fn scale_rejects_unknown_service() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let h = harness(&servers, FakeRuntime::new(EventLog::default()), 50);

    let err = tasks::scale(&h.stack, "worker", 3).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Precondition(_)));

    tasks::scale(&h.stack, "app", 3).await.unwrap();
    assert_eq!(h.log.events(), vec!["scale app 3"]);
}

#[tokio::test]
async fn remove_bucket_only_deletes_existing() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let runtime = FakeRuntime::new(EventLog::default())
        .with_exec(couchbase_cli("users\n bucketType: membase\n"));
    let h = harness(&servers, runtime, 50);

    assert!(!tasks::remove_bucket(&h.stack, "orders").await.unwrap());
    assert!(h.log.position("exec db couchbase-cli bucket-delete").is_none());

    assert!(tasks::remove_bucket(&h.stack, "users").await.unwrap());
    assert!(h.log.position("exec db couchbase-cli bucket-delete").is_some());
}

#[tokio::test]
async fn endpoints_resolve_through_published_ports() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let h = harness(&servers, FakeRuntime::new(EventLog::default()), 50);

    let endpoints = tasks::endpoints(&h.stack).await;
    assert_eq!(endpoints.len(), ServiceRole::ALL.len());

    let proxy = endpoints
        .iter()
        .find(|(role, _)| *role == ServiceRole::Proxy)
        .map(|(_, ep)| ep.clone())
        .unwrap();
    assert_eq!(proxy, servers.proxy.endpoint());

    // app publishes nothing, so its declared port passes through.
    let app = endpoints
        .iter()
        .find(|(role, _)| *role == ServiceRole::App)
        .map(|(_, ep)| ep.address())
        .unwrap();
    assert_eq!(app, "127.0.0.1:3000");
}

#[tokio::test]
async fn down_stops_the_project() {
    let servers = Servers::start(vec![(200, "true".to_string())]).await;
    let h = harness(&servers, FakeRuntime::new(EventLog::default()), 50);

    tasks::down(&h.stack).await.unwrap();
    assert_eq!(h.log.events(), vec!["down"]);
}
