//! Backend group and selection subsystem.
//!
//! # Data Flow
//! ```text
//! Poll tick
//!     → group.rs fans out one probe task per backend (bounded by a cycle deadline)
//!     → backend.rs records each outcome into its health snapshot
//!     → consensus aggregator + fallback controller
//!     → group.rs publishes the new ConsensusSnapshot and notifies listeners
//!
//! Request
//!     → group.rs loads the current snapshot's eligible set
//!     → Apply load balancing algorithm:
//!         - weighted.rs (random, proportional to weight)
//!         - round_robin.rs (rotate through backends)
//!     → Return backend or NoEligibleBackend
//! ```
//!
//! # Design Decisions
//! - Selection is lock-free: the eligible set is precomputed per cycle
//! - Strategies only choose among eligible backends; they never judge health

pub mod backend;
pub mod group;
pub mod round_robin;
pub mod weighted;

use std::sync::Arc;

use self::backend::Backend;

pub use group::{BackendGroup, GroupError, RequestContext, RoutingError};

/// Strategy for choosing one backend out of an eligible set.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

#[cfg(test)]
pub(crate) fn test_backend(index: usize, name: &str, weight: u32) -> Backend {
    use crate::config::{BackendConfig, BackendRole};

    let config = BackendConfig {
        name: name.to_string(),
        rpc_url: format!("http://127.0.0.1:{}", 18_000 + index),
        role: BackendRole::Primary,
        weight,
    };
    Backend::new(
        index,
        &config,
        reqwest::Client::new(),
        std::time::Duration::from_secs(1),
    )
    .expect("valid test url")
}
