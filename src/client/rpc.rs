//! JSON-RPC transport
//!
//! Thin wrapper around a node's JSON-RPC endpoint, shared by every request a
//! [`super::TraceClient`] makes.

use super::ClientError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC client bound to one node URL
pub struct RpcClient {
    client: Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client sending `headers` with every request
    pub fn new(url: &str, headers: &[(String, String)], timeout: Duration) -> Result<Self, ClientError> {
        let url = Url::parse(url)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid node URL {}: {}", url, e)))?;

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ClientError::InvalidConfig(format!("invalid header name {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidConfig(format!("invalid value for header {}: {}", key, e)))?;
            header_map.insert(name, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(header_map)
            .build()?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make an RPC call, returning the `result` member (which may be `null`)
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let response = self.client.post(self.url.clone()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        let json: Value = response.json().await?;
        extract_result(method, json)
    }
}

/// Split a JSON-RPC response envelope into its result or error
pub(crate) fn extract_result(method: &str, mut json: Value) -> Result<Value, ClientError> {
    if let Some(error) = json.get("error") {
        if !error.is_null() {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.to_string());
            return Err(ClientError::Rpc { code, message });
        }
    }

    json.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ClientError::MalformedResponse(format!("{} response missing result", method)))
}
