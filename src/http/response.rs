//! JSON-RPC error responses produced by the proxy itself.
//!
//! Upstream responses are relayed as-is; these cover the cases where no
//! upstream answer exists.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// No backend is eligible to serve the request.
pub const ERR_NO_BACKENDS: i64 = -32011;
/// The selected backend could not be reached.
pub const ERR_UPSTREAM: i64 = -32603;

pub fn rpc_error(status: StatusCode, id: Value, code: i64, message: &str) -> Response {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    });
    (status, Json(body)).into_response()
}

/// HTTP 503 for an empty eligible set.
pub fn no_backends(id: Value) -> Response {
    rpc_error(
        StatusCode::SERVICE_UNAVAILABLE,
        id,
        ERR_NO_BACKENDS,
        "no backends available for method",
    )
}

/// HTTP 502 for a transport failure talking to the chosen backend.
pub fn upstream_failed(id: Value) -> Response {
    rpc_error(StatusCode::BAD_GATEWAY, id, ERR_UPSTREAM, "upstream request failed")
}
