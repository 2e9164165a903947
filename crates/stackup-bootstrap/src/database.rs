//! Database provisioning: buckets first, then one primary index per bucket.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use stackup_core::{Endpoint, QueryIndex, StorageBucket};
use stackup_health::{HttpProbe, ReadinessPoller};

use crate::admin::{AdminProbe, DatabaseAdmin, IndexOutcome};
use crate::error::BootstrapResult;

/// What a bootstrap pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseReport {
    /// Buckets created by this run, in creation order.
    pub created: Vec<String>,
    /// Buckets that already existed and were left alone.
    pub skipped: Vec<String>,
    pub indexes: Vec<(String, IndexOutcome)>,
}

pub struct DatabaseBootstrapper {
    admin: Arc<dyn DatabaseAdmin>,
    poller: ReadinessPoller,
    timeout: Duration,
}

impl DatabaseBootstrapper {
    pub fn new(admin: Arc<dyn DatabaseAdmin>, poller: ReadinessPoller, timeout: Duration) -> Self {
        Self {
            admin,
            poller,
            timeout,
        }
    }

    /// Gate on the node's HTTP API and admin interface, create the missing
    /// buckets in order, then index every bucket in the same order.
    ///
    /// Reruns are safe: existing buckets are skipped and an existing
    /// primary index is reported as `IndexOutcome::AlreadyExists`.
    pub async fn run(
        &self,
        http: &Endpoint,
        health_path: &str,
        query: &Endpoint,
        buckets: &[StorageBucket],
    ) -> BootstrapResult<DatabaseReport> {
        self.poller
            .wait(&HttpProbe::new(http.clone(), health_path, self.timeout))
            .await?;
        self.poller.wait(&AdminProbe::new(self.admin.clone())).await?;

        let existing = self.admin.list_buckets().await?;
        let mut report = DatabaseReport::default();

        for bucket in buckets {
            if existing.contains(&bucket.name) {
                info!(bucket = %bucket.name, "bucket exists; skipping");
                report.skipped.push(bucket.name.clone());
                continue;
            }
            self.admin.create_bucket(bucket).await?;
            report.created.push(bucket.name.clone());
        }

        for bucket in buckets {
            let index = QueryIndex::primary(&bucket.name);
            let outcome = self.admin.create_index(query, &index).await?;
            report.indexes.push((bucket.name.clone(), outcome));
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            indexes = report.indexes.len(),
            "database ready"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use stackup_core::RetryPolicy;
    use stackup_health::testing::CannedServer;

    use super::*;
    use crate::error::BootstrapError;

    #[derive(Default)]
    struct MemoryAdmin {
        buckets: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
        pings_before_ready: u32,
        pings: Mutex<u32>,
    }

    impl MemoryAdmin {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseAdmin for MemoryAdmin {
        async fn ping(&self) -> BootstrapResult<bool> {
            let mut pings = self.pings.lock().unwrap();
            *pings += 1;
            Ok(*pings > self.pings_before_ready)
        }

        async fn list_buckets(&self) -> BootstrapResult<Vec<String>> {
            Ok(self.buckets.lock().unwrap().clone())
        }

        async fn create_bucket(&self, bucket: &StorageBucket) -> BootstrapResult<()> {
            self.calls.lock().unwrap().push(format!("bucket {}", bucket.name));
            self.buckets.lock().unwrap().push(bucket.name.clone());
            Ok(())
        }

        async fn delete_bucket(&self, name: &str) -> BootstrapResult<()> {
            self.buckets.lock().unwrap().retain(|b| b != name);
            Ok(())
        }

        async fn create_index(
            &self,
            _query: &Endpoint,
            index: &QueryIndex,
        ) -> BootstrapResult<IndexOutcome> {
            if !self.buckets.lock().unwrap().contains(&index.bucket) {
                return Err(BootstrapError::Index {
                    bucket: index.bucket.clone(),
                    status: 500,
                    detail: "Keyspace not found".to_string(),
                });
            }
            let mut calls = self.calls.lock().unwrap();
            let statement = index.statement();
            let outcome = if calls.contains(&statement) {
                IndexOutcome::AlreadyExists
            } else {
                IndexOutcome::Created
            };
            calls.push(statement);
            Ok(outcome)
        }
    }

    fn buckets() -> Vec<StorageBucket> {
        ["users", "users_pictures", "users_publishments"]
            .into_iter()
            .map(|name| StorageBucket::new(name, 100, 1))
            .collect()
    }

    fn bootstrapper(admin: Arc<MemoryAdmin>) -> DatabaseBootstrapper {
        let poller =
            ReadinessPoller::new(RetryPolicy::fixed(Duration::from_millis(10), Some(50)));
        DatabaseBootstrapper::new(admin, poller, Duration::from_secs(2))
    }

    fn query() -> Endpoint {
        Endpoint::new("127.0.0.1", 8093).unwrap()
    }

    #[tokio::test]
    async fn creates_three_buckets_then_three_indexes_in_order() {
        let server = CannedServer::start(vec![(200, "ok".to_string())]).await;
        let admin = Arc::new(MemoryAdmin::default());

        let report = bootstrapper(admin.clone())
            .run(&server.endpoint(), "/ui/index.html", &query(), &buckets())
            .await
            .unwrap();

        assert_eq!(
            admin.calls(),
            vec![
                "bucket users",
                "bucket users_pictures",
                "bucket users_publishments",
                "CREATE PRIMARY INDEX ON `users`",
                "CREATE PRIMARY INDEX ON `users_pictures`",
                "CREATE PRIMARY INDEX ON `users_publishments`",
            ]
        );
        assert_eq!(report.created.len(), 3);
        assert!(report.skipped.is_empty());
        assert!(report.indexes.iter().all(|(_, o)| *o == IndexOutcome::Created));
    }

    #[tokio::test]
    async fn rerun_skips_existing_buckets_and_indexes() {
        let server = CannedServer::start(vec![(200, "ok".to_string())]).await;
        let admin = Arc::new(MemoryAdmin::default());
        let boot = bootstrapper(admin.clone());

        boot.run(&server.endpoint(), "/", &query(), &buckets())
            .await
            .unwrap();
        let second = boot
            .run(&server.endpoint(), "/", &query(), &buckets())
            .await
            .unwrap();

        assert!(second.created.is_empty());
        assert_eq!(second.skipped, vec!["users", "users_pictures", "users_publishments"]);
        assert!(second
            .indexes
            .iter()
            .all(|(_, o)| *o == IndexOutcome::AlreadyExists));
    }

    #[tokio::test]
    async fn waits_for_http_api_and_admin_before_creating() {
        let server = CannedServer::start(vec![
            (503, "warming up".to_string()),
            (503, "warming up".to_string()),
            (200, "ok".to_string()),
        ])
        .await;
        let admin = Arc::new(MemoryAdmin {
            pings_before_ready: 2,
            ..Default::default()
        });

        bootstrapper(admin.clone())
            .run(&server.endpoint(), "/ui/index.html", &query(), &buckets())
            .await
            .unwrap();

        assert_eq!(server.requests().await.len(), 3);
        assert_eq!(*admin.pings.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn unreachable_node_is_never_ready() {
        let admin = Arc::new(MemoryAdmin::default());
        let poller = ReadinessPoller::new(RetryPolicy::fixed(Duration::from_millis(5), Some(2)));
        let boot = DatabaseBootstrapper::new(admin.clone(), poller, Duration::from_millis(200));

        let dead = Endpoint::new("127.0.0.1", 1).unwrap();
        let err = boot.run(&dead, "/", &query(), &buckets()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::NotReady(_)));
        assert!(admin.calls().is_empty());
    }
}
