//! Backend group orchestration.
//!
//! # Responsibilities
//! - Own the backends of one group and drive the poll → aggregate → fallback cycle
//! - Publish each cycle's `ConsensusSnapshot` atomically for concurrent readers
//! - Notify registered listeners, in registration order, after every publish
//! - Choose a backend for a request from the current eligible set
//!
//! # Concurrency
//! - One probe task per backend per cycle, joined against a cycle deadline
//! - Cycles are serialized by `cycle`; the publish step is the only snapshot writer
//! - `reset()` aborts an in-flight cycle through the `reset_tx` generation counter

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use crate::blockchain::{BlockNumber, RpcError};
use crate::config::{BackendRole, ProxyConfig, RoutingStrategy};
use crate::consensus::{
    aggregate, BackendView, ConsensusSnapshot, FallbackController, FallbackState,
};
use crate::health::{BackendHealth, ProbeOutcome, ProbePolicy, Prober};
use crate::load_balancer::{
    backend::Backend, round_robin::RoundRobin, weighted::Weighted, LoadBalancer,
};
use crate::observability::metrics;

/// Callback invoked with every newly published snapshot.
pub type ConsensusListener = Arc<dyn Fn(&ConsensusSnapshot) + Send + Sync>;

/// Errors building a group from configuration.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("backend '{name}' has invalid rpc_url: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors surfaced to the request path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Nothing can serve the request; maps to HTTP 503.
    #[error("no eligible backend (fallback mode: {fallback_mode})")]
    NoEligibleBackend { fallback_mode: bool },
}

/// Per-request information used for backend selection and logging.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
}

#[derive(Debug, Default)]
struct CycleState {
    controller: FallbackController,
    cycle: u64,
}

/// A set of redundant backends tracked as one consensus group.
pub struct BackendGroup {
    name: String,
    backends: Vec<Arc<Backend>>,
    prober: Prober,
    policy: ProbePolicy,
    tolerance: u64,
    poll_interval: Duration,
    cycle_timeout: Duration,
    balancer: Box<dyn LoadBalancer>,
    snapshot: ArcSwap<ConsensusSnapshot>,
    listeners: Mutex<Vec<ConsensusListener>>,
    cycle: tokio::sync::Mutex<CycleState>,
    reset_tx: watch::Sender<u64>,
}

impl BackendGroup {
    /// Build a group from configuration. No probing happens until the first cycle.
    pub fn from_config(name: impl Into<String>, config: &ProxyConfig) -> Result<Self, GroupError> {
        let consensus = &config.consensus;
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let backends = config
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| {
                Backend::new(index, backend, http.clone(), consensus.rpc_timeout())
                    .map(Arc::new)
                    .map_err(|source| GroupError::InvalidUrl {
                        name: backend.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let balancer: Box<dyn LoadBalancer> = match config.routing.strategy {
            RoutingStrategy::Weighted => Box::new(Weighted::new()),
            RoutingStrategy::RoundRobin => Box::new(RoundRobin::new()),
        };

        let (reset_tx, _) = watch::channel(0);

        Ok(Self {
            name: name.into(),
            backends,
            prober: Prober::new(consensus.skip_peer_count),
            policy: ProbePolicy::from_config(consensus),
            tolerance: consensus.block_tolerance,
            poll_interval: consensus.poll_interval(),
            cycle_timeout: consensus.cycle_timeout(),
            balancer,
            snapshot: ArcSwap::from_pointee(ConsensusSnapshot::default()),
            listeners: Mutex::new(Vec::new()),
            cycle: tokio::sync::Mutex::new(CycleState::default()),
            reset_tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn backend(&self, name: &str) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| b.name == name)
    }

    // --- Read accessors ---

    /// The snapshot published by the most recent cycle.
    pub fn current_consensus(&self) -> Arc<ConsensusSnapshot> {
        self.snapshot.load_full()
    }

    pub fn consensus_group(&self) -> Vec<Arc<Backend>> {
        self.snapshot.load().consensus_group.clone()
    }

    pub fn fallback_mode(&self) -> bool {
        self.snapshot.load().fallback_mode
    }

    pub fn latest_block_number(&self) -> BlockNumber {
        self.snapshot.load().heights.latest
    }

    pub fn safe_block_number(&self) -> BlockNumber {
        self.snapshot.load().heights.safe
    }

    pub fn finalized_block_number(&self) -> BlockNumber {
        self.snapshot.load().heights.finalized
    }

    // --- Routing ---

    /// Choose a backend for a request among the currently eligible set.
    pub fn select_backend(&self, ctx: &RequestContext) -> Result<Arc<Backend>, RoutingError> {
        let snapshot = self.snapshot.load();
        match self.balancer.next_server(&snapshot.eligible) {
            Some(backend) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    backend = %backend.name,
                    "Backend selected"
                );
                Ok(backend)
            }
            None => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    group = %self.name,
                    fallback_mode = snapshot.fallback_mode,
                    has_data = snapshot.has_data,
                    "No eligible backend"
                );
                Err(RoutingError::NoEligibleBackend {
                    fallback_mode: snapshot.fallback_mode,
                })
            }
        }
    }

    // --- Listeners ---

    /// Register a callback run after every publish, in registration order.
    ///
    /// Listeners run while the cycle lock is held and must not wait on
    /// `force_update` or `reset`.
    pub fn on_consensus_change<F>(&self, listener: F)
    where
        F: Fn(&ConsensusSnapshot) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn clear_listeners(&self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn notify(&self, snapshot: &ConsensusSnapshot) {
        // Cloned so a listener may register or clear listeners itself.
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(snapshot);
        }
    }

    // --- Control ---

    /// Run one poll cycle now. Returns `None` if a reset aborted it.
    pub async fn force_update(&self) -> Option<Arc<ConsensusSnapshot>> {
        self.run_cycle().await
    }

    /// Abort any in-flight cycle and return every backend, the fallback
    /// controller and the published snapshot to their initial state.
    pub async fn reset(&self) {
        self.reset_tx.send_modify(|generation| *generation += 1);
        let mut state = self.cycle.lock().await;
        state.controller.reset();
        state.cycle = 0;
        for backend in &self.backends {
            backend.reset_health();
        }
        self.snapshot.store(Arc::new(ConsensusSnapshot::default()));
        tracing::info!(group = %self.name, "Consensus state reset");
    }

    /// Poll on a fixed interval until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            group = %self.name,
            backends = self.backends.len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Consensus poller starting"
        );

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.run_cycle() => {}
                        _ = shutdown.recv() => break,
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::info!(group = %self.name, "Consensus poller stopped");
    }

    async fn run_cycle(&self) -> Option<Arc<ConsensusSnapshot>> {
        let mut reset_rx = self.reset_tx.subscribe();

        let mut state = tokio::select! {
            state = self.cycle.lock() => state,
            _ = reset_rx.changed() => return None,
        };

        let outcomes = tokio::select! {
            outcomes = self.probe_all() => outcomes,
            _ = reset_rx.changed() => {
                tracing::info!(group = %self.name, "Poll cycle aborted by reset");
                return None;
            }
        };

        let now = Instant::now();
        let views: Vec<BackendView> = self
            .backends
            .iter()
            .zip(outcomes)
            .map(|(backend, outcome)| {
                let before = backend.health();
                let after = backend.record_probe(outcome, now, &self.policy);
                log_transition(backend, &before, &after);
                metrics::record_backend_health(&backend.name, &after);
                BackendView {
                    index: backend.index,
                    health: after,
                }
            })
            .collect();

        let previous = self.snapshot.load_full();
        let result = aggregate(&views, previous.heights, self.tolerance);

        let roles: Vec<BackendRole> = self.backends.iter().map(|b| b.role).collect();
        let decision = state.controller.decide(&result.members, &roles);

        match (decision.transitioned, decision.state) {
            (true, FallbackState::Fallback) => tracing::warn!(
                group = %self.name,
                eligible = decision.eligible.len(),
                "No primary backend in consensus, entering fallback mode"
            ),
            (true, FallbackState::Normal) => {
                tracing::info!(group = %self.name, "Primary backend back in consensus, leaving fallback mode")
            }
            _ => {}
        }

        state.cycle += 1;
        let pick = |indices: &[usize]| -> Vec<Arc<Backend>> {
            indices.iter().map(|&i| self.backends[i].clone()).collect()
        };
        let snapshot = Arc::new(ConsensusSnapshot {
            cycle: state.cycle,
            heights: result.heights,
            consensus_group: pick(&result.members),
            eligible: pick(&decision.eligible),
            fallback_mode: decision.state == FallbackState::Fallback,
            has_data: previous.has_data || result.has_candidates,
        });

        if snapshot.heights != previous.heights {
            tracing::debug!(
                group = %self.name,
                latest = %snapshot.heights.latest,
                safe = %snapshot.heights.safe,
                finalized = %snapshot.heights.finalized,
                "Consensus heights updated"
            );
        }

        self.snapshot.store(snapshot.clone());
        metrics::record_consensus(&snapshot);

        // Notified under the cycle lock so a concurrent reset is never overtaken.
        self.notify(&snapshot);
        drop(state);
        Some(snapshot)
    }

    /// Probe every backend concurrently. Probes still running at the cycle
    /// deadline are aborted and reported as timeouts.
    async fn probe_all(&self) -> Vec<ProbeOutcome> {
        let mut tasks = JoinSet::new();
        for backend in &self.backends {
            let backend = backend.clone();
            let prober = self.prober.clone();
            tasks.spawn(async move {
                let outcome = prober.probe(&backend).await;
                (backend.index, outcome)
            });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> = (0..self.backends.len()).map(|_| None).collect();
        let deadline = Instant::now() + self.cycle_timeout;

        loop {
            match time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => outcomes[index] = Some(outcome),
                Ok(Some(Err(e))) => {
                    tracing::error!(group = %self.name, error = %e, "Probe task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        group = %self.name,
                        pending = tasks.len(),
                        "Poll cycle deadline elapsed, aborting slow probes"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let timeout_ms = self.cycle_timeout.as_millis() as u64;
        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| ProbeOutcome::failed(RpcError::Timeout(timeout_ms))))
            .collect()
    }
}

impl std::fmt::Debug for BackendGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendGroup")
            .field("name", &self.name)
            .field("backends", &self.backends.len())
            .field("balancer", &self.balancer)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

fn log_transition(backend: &Backend, before: &BackendHealth, after: &BackendHealth) {
    match (before.is_banned(), after.is_banned()) {
        (false, true) => tracing::warn!(
            backend = %backend.name,
            reason = ?after.ban_reason,
            peer_count = ?after.peer_count,
            consecutive_errors = after.consecutive_errors,
            "Backend banned"
        ),
        (true, false) => tracing::info!(backend = %backend.name, "Backend ban lifted"),
        _ => {}
    }
    if after.unreachable && !before.unreachable {
        tracing::warn!(
            backend = %backend.name,
            error = ?after.last_error,
            "Every probe query failed, excluded until it answers again"
        );
    }
    if after.regressed {
        tracing::warn!(
            backend = %backend.name,
            previous = ?before.latest.as_ref().map(|b| b.number),
            reported = ?after.latest.as_ref().map(|b| b.number),
            "Latest block went backwards, excluded from this cycle"
        );
    }
}
