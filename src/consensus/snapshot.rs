//! Published consensus state.

use std::sync::Arc;

use serde::Serialize;

use crate::blockchain::BlockNumber;
use crate::load_balancer::backend::Backend;

/// Group-wide agreed heights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Heights {
    pub latest: BlockNumber,
    pub safe: BlockNumber,
    pub finalized: BlockNumber,
}

/// Immutable result of one poll cycle. Readers hold an `Arc` to the snapshot
/// that was current when they loaded it; a new cycle publishes a new value.
#[derive(Debug, Clone, Default)]
pub struct ConsensusSnapshot {
    /// Poll cycle that produced this snapshot (0 before the first cycle).
    pub cycle: u64,
    pub heights: Heights,
    /// Backends agreeing with `heights.latest` within tolerance, in config order.
    pub consensus_group: Vec<Arc<Backend>>,
    /// Backends requests may be routed to.
    pub eligible: Vec<Arc<Backend>>,
    pub fallback_mode: bool,
    /// Whether any cycle so far found at least one candidate.
    pub has_data: bool,
}

impl ConsensusSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.consensus_group.iter().any(|b| b.name == name)
    }

    pub fn view(&self) -> ConsensusView {
        ConsensusView {
            cycle: self.cycle,
            latest_block: self.heights.latest,
            safe_block: self.heights.safe,
            finalized_block: self.heights.finalized,
            consensus_group: self.consensus_group.iter().map(|b| b.name.clone()).collect(),
            eligible: self.eligible.iter().map(|b| b.name.clone()).collect(),
            fallback_mode: self.fallback_mode,
            has_data: self.has_data,
        }
    }
}

/// Serializable form of a snapshot for the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusView {
    pub cycle: u64,
    pub latest_block: BlockNumber,
    pub safe_block: BlockNumber,
    pub finalized_block: BlockNumber,
    pub consensus_group: Vec<String>,
    pub eligible: Vec<String>,
    pub fallback_mode: bool,
    pub has_data: bool,
}
