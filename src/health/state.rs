//! Per-backend health state.
//!
//! # Transitions
//! ```text
//! probe outcome + previous BackendHealth → next BackendHealth
//!
//! any query failed        → consecutive_errors += 1, failed fields keep stale values
//! all queries succeeded   → consecutive_errors = 0
//! latest height went down → value recorded, backend marked regressed for this cycle
//! policy violation        → banned_until = now + ban_period
//! clean probe after ban   → ban lifted once now >= banned_until
//! ```
//!
//! Policy violations are: too many consecutive errors, a peer count under the
//! minimum, the node reporting itself as syncing, or a head that has not moved
//! within the update threshold.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::blockchain::{BlockRef, RpcError, RpcResult};
use crate::config::ConsensusConfig;

/// Ban thresholds applied after every probe.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub max_consecutive_errors: u32,
    pub min_peer_count: u64,
    pub skip_peer_count: bool,
    pub ban_period: Duration,
    pub max_update_threshold: Option<Duration>,
}

impl ProbePolicy {
    pub fn from_config(config: &ConsensusConfig) -> Self {
        Self {
            max_consecutive_errors: config.max_consecutive_errors,
            min_peer_count: config.min_peer_count,
            skip_peer_count: config.skip_peer_count,
            ban_period: Duration::from_secs(config.ban_period_secs),
            max_update_threshold: match config.max_update_threshold_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Why a backend is currently banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BanReason {
    TooManyErrors,
    LowPeerCount,
    Syncing,
    StaleHead,
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BanReason::TooManyErrors => "too many consecutive errors",
            BanReason::LowPeerCount => "peer count below minimum",
            BanReason::Syncing => "node is syncing",
            BanReason::StaleHead => "head not updated",
        };
        f.write_str(s)
    }
}

/// Raw results of one probe round against a backend.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub latest: RpcResult<BlockRef>,
    pub safe: RpcResult<BlockRef>,
    pub finalized: RpcResult<BlockRef>,
    /// `None` when the peer-count query is disabled.
    pub peer_count: Option<RpcResult<u64>>,
    pub syncing: RpcResult<bool>,
}

impl ProbeOutcome {
    /// An outcome in which every query failed with `error`.
    pub fn failed(error: RpcError) -> Self {
        Self {
            latest: Err(error.clone()),
            safe: Err(error.clone()),
            finalized: Err(error.clone()),
            peer_count: Some(Err(error.clone())),
            syncing: Err(error),
        }
    }

    /// The first failed query, if any.
    pub fn first_error(&self) -> Option<&RpcError> {
        self.latest
            .as_ref()
            .err()
            .or_else(|| self.safe.as_ref().err())
            .or_else(|| self.finalized.as_ref().err())
            .or_else(|| self.peer_count.as_ref().and_then(|p| p.as_ref().err()))
            .or_else(|| self.syncing.as_ref().err())
    }
}

/// Live health of one backend. Replaced wholesale after every probe.
#[derive(Debug, Clone, Default)]
pub struct BackendHealth {
    pub latest: Option<BlockRef>,
    pub safe: Option<BlockRef>,
    pub finalized: Option<BlockRef>,
    pub peer_count: Option<u64>,
    pub in_sync: bool,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub banned_until: Option<Instant>,
    pub ban_reason: Option<BanReason>,
    /// Latest height went backwards in the most recent probe.
    pub regressed: bool,
    /// Every query failed in the most recent probe.
    pub unreachable: bool,
    /// When the latest height last changed.
    pub head_changed_at: Option<Instant>,
}

impl BackendHealth {
    /// A ban stays in place until a clean probe after `banned_until`.
    pub fn is_banned(&self) -> bool {
        self.banned_until.is_some()
    }

    /// Whether this backend may take part in consensus this cycle.
    pub fn is_candidate(&self) -> bool {
        !self.is_banned()
            && self.in_sync
            && !self.regressed
            && !self.unreachable
            && self.latest.is_some()
    }

    /// Fold a probe outcome into the next health value.
    pub fn apply(&self, outcome: ProbeOutcome, now: Instant, policy: &ProbePolicy) -> Self {
        let mut next = self.clone();
        next.regressed = false;

        let first_error = outcome.first_error().map(ToString::to_string);
        next.unreachable = outcome.latest.is_err()
            && outcome.safe.is_err()
            && outcome.finalized.is_err()
            && outcome.syncing.is_err()
            && !matches!(outcome.peer_count, Some(Ok(_)));

        if let Ok(block) = outcome.latest {
            match &self.latest {
                Some(prev) if block.number < prev.number => {
                    next.regressed = true;
                    next.head_changed_at = Some(now);
                }
                Some(prev) if block.number == prev.number => {}
                _ => next.head_changed_at = Some(now),
            }
            next.latest = Some(block);
        }
        if let Ok(block) = outcome.safe {
            next.safe = Some(block);
        }
        if let Ok(block) = outcome.finalized {
            next.finalized = Some(block);
        }

        let mut fresh_peer_count = None;
        if !policy.skip_peer_count {
            if let Some(Ok(count)) = outcome.peer_count {
                next.peer_count = Some(count);
                fresh_peer_count = Some(count);
            }
        }

        let fresh_syncing = outcome.syncing.ok();
        if let Some(syncing) = fresh_syncing {
            next.in_sync = !syncing;
        }

        match first_error {
            Some(err) => {
                next.consecutive_errors = next.consecutive_errors.saturating_add(1);
                next.last_error = Some(err);
            }
            None => {
                next.consecutive_errors = 0;
                next.last_error = None;
            }
        }

        let violation = if next.consecutive_errors >= policy.max_consecutive_errors {
            Some(BanReason::TooManyErrors)
        } else if fresh_peer_count.is_some_and(|count| count < policy.min_peer_count) {
            Some(BanReason::LowPeerCount)
        } else if fresh_syncing == Some(true) {
            Some(BanReason::Syncing)
        } else if policy
            .max_update_threshold
            .zip(next.head_changed_at)
            .is_some_and(|(threshold, at)| now.saturating_duration_since(at) >= threshold)
        {
            Some(BanReason::StaleHead)
        } else {
            None
        };

        match violation {
            Some(reason) => {
                next.banned_until = Some(now + policy.ban_period);
                next.ban_reason = Some(reason);
            }
            None => {
                let expired = next.banned_until.is_some_and(|until| now >= until);
                if expired && next.consecutive_errors == 0 {
                    next.banned_until = None;
                    next.ban_reason = None;
                }
            }
        }

        next
    }
}
