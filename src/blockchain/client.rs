//! JSON-RPC client for upstream nodes.
//!
//! # Responsibilities
//! - Issue the chain-head, peer-count and sync-status calls the prober needs
//! - Enforce a per-call timeout
//! - Classify failures (transport, status, RPC error, missing or malformed result)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U64;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use url::Url;

use crate::blockchain::types::{BlockRef, BlockTag, RpcError, RpcResult};

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeaderFields {
    number: U64,
    hash: String,
}

/// JSON-RPC client bound to a single upstream endpoint.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
    timeout_duration: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a client for `url`. The `reqwest::Client` is shared so that
    /// connection pools are reused across backends.
    pub fn new(http: reqwest::Client, url: Url, timeout_duration: Duration) -> Self {
        Self {
            http,
            url,
            timeout_duration,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue a raw JSON-RPC call and return its `result`.
    pub async fn call(&self, method: &'static str, params: Value) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let request = async {
            let response = self
                .http
                .post(self.url.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| RpcError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::Status(status.as_u16()));
            }

            let envelope: RpcEnvelope = response.json().await.map_err(|e| RpcError::Malformed {
                method,
                reason: e.to_string(),
            })?;

            if let Some(err) = envelope.error {
                return Err(RpcError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }
            if envelope.result.is_null() {
                return Err(RpcError::MissingResult(method));
            }
            Ok(envelope.result)
        };

        match timeout(self.timeout_duration, request).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout(self.timeout_duration.as_millis() as u64)),
        }
    }

    /// `eth_getBlockByNumber(tag, false)`, reduced to height and hash.
    pub async fn get_block_by_tag(&self, tag: BlockTag) -> RpcResult<BlockRef> {
        let result = self
            .call("eth_getBlockByNumber", json!([tag.as_rpc(), false]))
            .await?;
        parse_block_ref(result)
    }

    /// `net_peerCount`.
    pub async fn peer_count(&self) -> RpcResult<u64> {
        let result = self.call("net_peerCount", json!([])).await?;
        parse_quantity("net_peerCount", result)
    }

    /// `eth_syncing`. Returns `true` while the node reports sync progress.
    pub async fn syncing(&self) -> RpcResult<bool> {
        let result = self.call("eth_syncing", json!([])).await?;
        parse_syncing(result)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url.as_str())
            .field("timeout_ms", &self.timeout_duration.as_millis())
            .finish()
    }
}

fn parse_block_ref(result: Value) -> RpcResult<BlockRef> {
    let fields: BlockHeaderFields =
        serde_json::from_value(result).map_err(|e| RpcError::Malformed {
            method: "eth_getBlockByNumber",
            reason: e.to_string(),
        })?;
    Ok(BlockRef::new(fields.number.to::<u64>(), fields.hash))
}

fn parse_quantity(method: &'static str, result: Value) -> RpcResult<u64> {
    let quantity: U64 = serde_json::from_value(result).map_err(|e| RpcError::Malformed {
        method,
        reason: e.to_string(),
    })?;
    Ok(quantity.to::<u64>())
}

// A syncing node answers with a progress object; its fields are not inspected.
fn parse_syncing(result: Value) -> RpcResult<bool> {
    match result {
        Value::Bool(syncing) => Ok(syncing),
        Value::Object(_) => Ok(true),
        other => Err(RpcError::Malformed {
            method: "eth_syncing",
            reason: format!("unexpected value {other}"),
        }),
    }
}
