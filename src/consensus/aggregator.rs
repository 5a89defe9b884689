//! Consensus aggregation over backend health.
//!
//! # Algorithm
//! ```text
//! candidates = backends that are not banned, in sync, not regressed, with a latest head
//!
//! latest:
//!     for each distinct reported height H (highest first)
//!         support(H) = candidates with latest in [H - tolerance, H]
//!     pick the H with the largest support; ties keep the higher H
//!     consensus group = candidates inside that band
//!
//! safe / finalized (over the consensus group):
//!     drop reports below the previously published value
//!     take the lowest remaining report, capped at the level above
//!     never publish less than the previous value
//! ```
//!
//! No candidates means no data: previous heights are kept and the group is empty.
//! The result depends only on the input order, which is config order.

use std::sync::Arc;

use crate::blockchain::{BlockNumber, BlockRef};
use crate::consensus::snapshot::Heights;
use crate::health::BackendHealth;

/// One backend's health as seen by the aggregator.
#[derive(Debug, Clone)]
pub struct BackendView {
    /// Position of the backend in the group.
    pub index: usize,
    pub health: Arc<BackendHealth>,
}

/// Output of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub heights: Heights,
    /// Indices of backends in the consensus group, ascending.
    pub members: Vec<usize>,
    pub has_candidates: bool,
}

/// Compute consensus heights and membership.
pub fn aggregate(views: &[BackendView], previous: Heights, tolerance: u64) -> Aggregate {
    let mut candidates: Vec<(usize, &BackendHealth, u64)> = views
        .iter()
        .filter(|view| view.health.is_candidate())
        .filter_map(|view| {
            let latest = view.health.latest.as_ref()?.number.as_u64();
            Some((view.index, view.health.as_ref(), latest))
        })
        .collect();
    candidates.sort_by_key(|(index, _, _)| *index);

    let mut reported: Vec<u64> = candidates.iter().map(|(_, _, latest)| *latest).collect();
    reported.sort_unstable_by(|a, b| b.cmp(a));
    reported.dedup();

    let Some((&highest, lower)) = reported.split_first() else {
        return Aggregate {
            heights: previous,
            members: Vec::new(),
            has_candidates: false,
        };
    };

    let in_band = |head: u64, latest: u64| latest <= head && latest >= head.saturating_sub(tolerance);
    let support = |head: u64| candidates.iter().filter(|(_, _, l)| in_band(head, *l)).count();

    let mut head = highest;
    let mut best = support(highest);
    for &height in lower {
        let count = support(height);
        if count > best {
            best = count;
            head = height;
        }
    }

    let members: Vec<&(usize, &BackendHealth, u64)> = candidates
        .iter()
        .filter(|(_, _, latest)| in_band(head, *latest))
        .collect();

    let safe = settle(
        members.iter().map(|(_, health, _)| &health.safe),
        previous.safe,
        BlockNumber(head),
    );
    let finalized = settle(
        members.iter().map(|(_, health, _)| &health.finalized),
        previous.finalized,
        safe,
    );

    Aggregate {
        heights: Heights {
            latest: BlockNumber(head),
            safe,
            finalized,
        },
        members: members.iter().map(|(index, _, _)| *index).collect(),
        has_candidates: true,
    }
}

// Lowest report at or above `previous`, capped at `ceiling`, never below `previous`.
fn settle<'a>(
    reports: impl Iterator<Item = &'a Option<BlockRef>>,
    previous: BlockNumber,
    ceiling: BlockNumber,
) -> BlockNumber {
    reports
        .filter_map(|block| block.as_ref().map(|b| b.number))
        .filter(|number| *number >= previous)
        .min()
        .map(|lowest| lowest.min(ceiling).max(previous))
        .unwrap_or(previous)
}
