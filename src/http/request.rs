//! Request inspection.
//!
//! Only the JSON-RPC `method` and `id` are read; the body is forwarded untouched.

use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID set by the request-id middleware, or "unknown".
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Deserialize)]
struct RpcPeek {
    #[serde(default)]
    method: String,
    #[serde(default)]
    id: Value,
}

/// What the proxy needs from a JSON-RPC request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequestInfo {
    pub method: String,
    pub id: Value,
}

/// Read method and id from a request body. Batches report method "batch".
pub fn peek_rpc(body: &[u8]) -> RpcRequestInfo {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(_)) => RpcRequestInfo {
            method: "batch".to_string(),
            id: Value::Null,
        },
        Ok(value) => match serde_json::from_value::<RpcPeek>(value) {
            Ok(peek) => RpcRequestInfo {
                method: peek.method,
                id: peek.id,
            },
            Err(_) => RpcRequestInfo::unknown(),
        },
        Err(_) => RpcRequestInfo::unknown(),
    }
}

impl RpcRequestInfo {
    fn unknown() -> Self {
        Self {
            method: "unknown".to_string(),
            id: Value::Null,
        }
    }
}
