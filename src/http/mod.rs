//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, peek JSON-RPC method and id)
//!     → BackendGroup::select_backend (current eligible set)
//!     → forward body to the backend, relay status and body
//!     → response.rs (JSON-RPC error bodies for 502/503)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{peek_rpc, request_id, RpcRequestInfo, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
