//! Minimal HTTP/1 client over a fresh TCP connection per request.
//!
//! stackup talks to a handful of dependencies a few times per run, so
//! there is no pooling: each call connects, performs one exchange under a
//! timeout, and drops the connection.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use tracing::debug;

use stackup_core::Endpoint;

use crate::error::HttpError;

const USER_AGENT: &str = "stackup/0.1";

/// A request against one endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    endpoint: Endpoint,
    path: String,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, endpoint: &Endpoint, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            method,
            endpoint: endpoint.clone(),
            path,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(endpoint: &Endpoint, path: &str) -> Self {
        Self::new(Method::GET, endpoint, path)
    }

    pub fn put(endpoint: &Endpoint, path: &str) -> Self {
        Self::new(Method::PUT, endpoint, path)
    }

    pub fn post(endpoint: &Endpoint, path: &str) -> Self {
        Self::new(Method::POST, endpoint, path)
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let token = base64_encode(format!("{user}:{password}").as_bytes());
        self.header("authorization", format!("Basic {token}"))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn uri(&self) -> String {
        self.endpoint.url(&self.path)
    }
}

/// Status and fully-read body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Perform one request, bounded by `timeout` end to end.
pub async fn send(request: HttpRequest, timeout: Duration) -> Result<HttpResponse, HttpError> {
    let uri = request.uri();
    match tokio::time::timeout(timeout, exchange(request)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%uri, "request timed out");
            Err(HttpError::Timeout { uri })
        }
    }
}

async fn exchange(request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let address = request.endpoint.address();
    let uri = request.uri();

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .map_err(|source| HttpError::Connect {
            address: address.clone(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|source| HttpError::Handshake {
            address: address.clone(),
            source,
        })?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut builder = http::Request::builder()
        .method(request.method.clone())
        .uri(request.path.as_str())
        .header("host", address.as_str())
        .header("user-agent", USER_AGENT);
    for (name, value) in &request.headers {
        builder = builder.header(*name, HeaderValue::from_str(value).map_err(http::Error::from)?);
    }
    let req = builder.body(Full::new(request.body.clone()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|source| HttpError::Request {
            uri: uri.clone(),
            source,
        })?;

    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|source| HttpError::Request {
            uri: uri.clone(),
            source,
        })?
        .to_bytes();

    debug!(%uri, method = %request.method, %status, "request complete");
    Ok(HttpResponse { status, body })
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard padded base64, used only for the Basic auth header.
fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                let idx = ((n >> (18 - 6 * i)) & 0x3f) as usize;
                out.push(BASE64_ALPHABET[idx] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}
