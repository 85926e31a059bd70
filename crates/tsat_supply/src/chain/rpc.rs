//! JSON-RPC client with strictly sequential fallback across configured endpoints.

use crate::config::Configuration;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
const REQUEST_ID: u64 = 1;
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("http status {0}: {1}")]
    Status(u16, String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("no rpc endpoints configured")]
    NoEndpoints,
    #[error("all {attempts} rpc endpoint(s) failed, last error: {last}")]
    Exhausted { attempts: usize, last: Box<RpcError> },
}

/// Raw HTTP outcome of one POST.
#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one JSON body to one endpoint. No retries at this layer.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, RpcError>;
}

/// reqwest transport: rustls with certificate verification, bounded timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, RpcError> {
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.without_url().to_string()))?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.without_url().to_string()))?;
        Ok(HttpReply { status, body })
    }
}

/// JSON-RPC 2.0 client. Tries the primary endpoint, then each fallback once, in order.
pub struct RpcClient<T = HttpTransport> {
    transport: T,
    attempt_count: AtomicU64,
}

impl RpcClient<HttpTransport> {
    /// Client over HTTPS with the default 15 second timeout.
    pub fn http() -> Result<Self, RpcError> {
        Ok(Self::new(HttpTransport::new(Duration::from_secs(
            DEFAULT_TIMEOUT_SECS,
        ))?))
    }
}

impl<T: RpcTransport> RpcClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            attempt_count: AtomicU64::new(0),
        }
    }

    pub fn envelope(method: &str, params: Value) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": REQUEST_ID,
            "method": method,
            "params": params,
        })
    }

    /// Call `method` and return its `result` verbatim (possibly null).
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        config: &Configuration,
    ) -> Result<Value, RpcError> {
        let request = Self::envelope(method, params);
        let mut attempts = 0usize;
        let mut last_err = None;
        for endpoint in config.endpoints() {
            attempts += 1;
            self.attempt_count.fetch_add(1, Ordering::Relaxed);
            let host = redact_endpoint(endpoint);
            debug!(%host, method, attempt = attempts, "rpc request");
            match self.attempt(endpoint, &request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(%host, method, error = %e, "rpc endpoint failed, moving on");
                    last_err = Some(e);
                }
            }
        }
        Err(RpcError::Exhausted {
            attempts,
            last: Box::new(last_err.unwrap_or(RpcError::NoEndpoints)),
        })
    }

    async fn attempt(&self, endpoint: &str, request: &Value) -> Result<Value, RpcError> {
        let reply = self.transport.post_json(endpoint, request).await?;
        if reply.status != 200 {
            let snippet: String = reply.body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(RpcError::Status(reply.status, snippet));
        }
        parse_response(&reply.body)
    }

    /// Endpoint attempts made over the client's lifetime.
    pub fn attempt_count(&self) -> u64 {
        self.attempt_count.load(Ordering::Relaxed)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Extract `result` from a JSON-RPC response body, failing on a non-null `error` member.
pub fn parse_response(body: &str) -> Result<Value, RpcError> {
    let mut response: Value =
        serde_json::from_str(body).map_err(|e| RpcError::Decode(e.to_string()))?;
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(RpcError::Rpc { code, message });
    }
    Ok(response
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// Host part only; provider URLs often embed API keys in the path or query.
fn redact_endpoint(endpoint: &str) -> String {
    url::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid url>".to_string())
}
