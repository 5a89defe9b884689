//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream node (identity, tier, weight, endpoint)
//! - Hold its live health as an immutable value swapped after every probe

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;
use url::Url;

use crate::blockchain::RpcClient;
use crate::config::{BackendConfig, BackendRole};
use crate::health::{BackendHealth, ProbeOutcome, ProbePolicy};

/// A single upstream node.
#[derive(Debug)]
pub struct Backend {
    /// Unique name from configuration.
    pub name: String,
    /// Position in the group; used for deterministic ordering.
    pub index: usize,
    pub role: BackendRole,
    pub weight: u32,
    client: RpcClient,
    health: ArcSwap<BackendHealth>,
}

impl Backend {
    /// Create a backend from configuration.
    pub fn new(
        index: usize,
        config: &BackendConfig,
        http: reqwest::Client,
        rpc_timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        let url = Url::parse(&config.rpc_url)?;
        Ok(Self {
            name: config.name.clone(),
            index,
            role: config.role,
            weight: config.weight,
            client: RpcClient::new(http, url, rpc_timeout),
            health: ArcSwap::from_pointee(BackendHealth::default()),
        })
    }

    pub fn rpc_url(&self) -> &Url {
        self.client.url()
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn is_primary(&self) -> bool {
        self.role == BackendRole::Primary
    }

    /// Current health snapshot.
    pub fn health(&self) -> Arc<BackendHealth> {
        self.health.load_full()
    }

    /// Fold a probe outcome into this backend's health and publish it.
    ///
    /// Only the group's poll cycle calls this, once per backend per cycle.
    pub(crate) fn record_probe(
        &self,
        outcome: ProbeOutcome,
        now: Instant,
        policy: &ProbePolicy,
    ) -> Arc<BackendHealth> {
        let next = Arc::new(self.health.load().apply(outcome, now, policy));
        self.health.store(next.clone());
        next
    }

    pub(crate) fn reset_health(&self) {
        self.health.store(Arc::new(BackendHealth::default()));
    }
}
