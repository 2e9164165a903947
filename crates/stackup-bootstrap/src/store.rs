//! Config store client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use stackup_core::Endpoint;
use stackup_health::{HttpError, HttpRequest, send};

/// A key-value store that services read their configuration from.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Write `value` under `key` on the store at `endpoint`.
    ///
    /// `Ok(false)` means the store answered but did not accept the write
    /// (still electing a leader, 5xx); callers retry that like a refused
    /// connection.
    async fn put(&self, endpoint: &Endpoint, key: &str, value: &[u8]) -> Result<bool, HttpError>;
}

/// Consul's KV API: `PUT /v1/kv/<key>` answers `true` on success.
#[derive(Debug, Clone)]
pub struct ConsulKv {
    timeout: Duration,
}

impl ConsulKv {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConfigStore for ConsulKv {
    async fn put(&self, endpoint: &Endpoint, key: &str, value: &[u8]) -> Result<bool, HttpError> {
        let path = format!("/v1/kv/{}", key.trim_start_matches('/'));
        let req = HttpRequest::put(endpoint, &path).body(value.to_vec());
        let resp = send(req, self.timeout).await?;
        let accepted = resp.is_success() && resp.text().trim() == "true";
        if !accepted {
            debug!(status = %resp.status, %key, "kv write not accepted");
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackup_health::testing::CannedServer;

    #[tokio::test]
    async fn put_sends_raw_bytes_to_kv_path() {
        let server = CannedServer::start(vec![(200, "true".to_string())]).await;
        let kv = ConsulKv::new(Duration::from_secs(2));

        let ok = kv
            .put(&server.endpoint(), "app/template", b"{{ key \"x\" }}")
            .await
            .unwrap();
        assert!(ok);

        let req = &server.requests().await[0];
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, "/v1/kv/app/template");
        assert_eq!(req.body_text(), "{{ key \"x\" }}");
    }

    #[tokio::test]
    async fn false_body_is_not_accepted() {
        let server = CannedServer::start(vec![(200, "false".to_string())]).await;
        let kv = ConsulKv::new(Duration::from_secs(2));
        assert!(!kv.put(&server.endpoint(), "k", b"v").await.unwrap());
    }

    #[tokio::test]
    async fn server_error_is_not_accepted() {
        let server = CannedServer::start(vec![(500, "No cluster leader".to_string())]).await;
        let kv = ConsulKv::new(Duration::from_secs(2));
        assert!(!kv.put(&server.endpoint(), "k", b"v").await.unwrap());
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let kv = ConsulKv::new(Duration::from_millis(200));
        let ep = Endpoint::new("127.0.0.1", 1).unwrap();
        assert!(kv.put(&ep, "k", b"v").await.is_err());
    }
}
