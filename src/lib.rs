//! Consensus-aware JSON-RPC proxy library.

pub mod admin;
pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use consensus::ConsensusSnapshot;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::BackendGroup;
