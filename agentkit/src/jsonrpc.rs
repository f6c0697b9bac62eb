//! Minimal JSON-RPC 2.0 client over [`reqwest`].
//!
//! Used for endpoints that alloy's provider does not speak: Solana nodes,
//! ERC-4337 bundlers, and intent services. Errors keep the server's code and
//! message.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::wallet::WalletError;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, serde::Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, serde::Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// A JSON-RPC 2.0 client bound to one endpoint.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `url` does not parse.
    pub fn new(url: &str) -> Result<Self, WalletError> {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `url` does not parse.
    pub fn with_client(http: reqwest::Client, url: &str) -> Result<Self, WalletError> {
        let url = Url::parse(url)
            .map_err(|e| WalletError::config(format!("invalid RPC URL '{url}': {e}")))?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Call `method` with `params` and decode the `result` field.
    ///
    /// A `null` result decodes into `R` as JSON `null`, so `Option<_>` result
    /// types observe "not found yet" without an error.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Provider`] on transport failure, a JSON-RPC error
    /// object, or a result that does not decode into `R`.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, WalletError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(url = %self.url, method, id, "json-rpc request");

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::provider(format!("{method} request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WalletError::provider(format!("{method} response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(WalletError::provider(format!(
                "{method} returned HTTP {status}: {text}"
            )));
        }

        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| WalletError::provider(format!("{method} response malformed: {e}")))?;

        if let Some(err) = parsed.error {
            let data = err.data.map(|d| format!(" ({d})")).unwrap_or_default();
            return Err(WalletError::provider(format!(
                "{method} failed with code {}: {}{data}",
                err.code, err.message
            )));
        }

        serde_json::from_value(parsed.result.unwrap_or(Value::Null))
            .map_err(|e| WalletError::provider(format!("{method} result malformed: {e}")))
    }
}
