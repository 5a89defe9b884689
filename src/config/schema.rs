//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the consensus proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream node definitions, in priority order.
    pub backends: Vec<BackendConfig>,

    /// Consensus polling and ban policy.
    pub consensus: ConsensusConfig,

    /// Backend selection strategy.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8545").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8545".to_string(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Tier a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendRole {
    /// Serves traffic whenever it is in consensus.
    #[default]
    Primary,
    /// Only serves traffic while the group is in fallback mode.
    Fallback,
}

/// Upstream node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// JSON-RPC endpoint (e.g., "http://127.0.0.1:8545").
    pub rpc_url: String,

    /// Primary or fallback tier.
    #[serde(default)]
    pub role: BackendRole,

    /// Weight for weighted selection (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Consensus polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Interval between poll cycles in milliseconds.
    pub poll_interval_ms: u64,

    /// Deadline for a whole poll cycle in milliseconds. Probes still running
    /// when it elapses are aborted and count as failures.
    pub cycle_timeout_ms: u64,

    /// Timeout for a single upstream RPC call in milliseconds.
    pub rpc_timeout_ms: u64,

    /// Maximum distance, in blocks, between a backend's head and the
    /// consensus head for the backend to count as agreeing.
    pub block_tolerance: u64,

    /// How long a policy violation bans a backend, in seconds.
    pub ban_period_secs: u64,

    /// Consecutive failed probes before a backend is banned.
    pub max_consecutive_errors: u32,

    /// Minimum peer count a backend must report.
    pub min_peer_count: u64,

    /// Skip the `net_peerCount` query and check entirely.
    pub skip_peer_count: bool,

    /// Ban a backend whose head has not advanced for this many seconds (0 disables).
    pub max_update_threshold_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            cycle_timeout_ms: 1_500,
            rpc_timeout_ms: 1_000,
            block_tolerance: 0,
            ban_period_secs: 300,
            max_consecutive_errors: 3,
            min_peer_count: 3,
            skip_peer_count: false,
            max_update_threshold_secs: 30,
        }
    }
}

impl ConsensusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Backend selection strategy among the eligible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    Weighted,
    RoundRobin,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    pub strategy: RoutingStrategy,
}

/// Timeout configuration for proxied requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
