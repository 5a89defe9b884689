//! Upstream node access.
//!
//! # Data Flow
//! ```text
//! Prober
//!     → client.rs (JSON-RPC over HTTP with per-call timeout)
//!     → types.rs (BlockRef, BlockNumber, RpcError)
//! ```
//!
//! # Constraints
//! - Every upstream call has a deadline
//! - Only the chain-head, peer-count and sync-status calls are interpreted;
//!   everything else is relayed verbatim by the HTTP layer

pub mod client;
pub mod types;

pub use client::RpcClient;
pub use types::{BlockNumber, BlockRef, BlockTag, RpcError, RpcResult};
