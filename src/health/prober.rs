//! Active probing of a single backend.
//!
//! # Responsibilities
//! - Query chain heads (latest, safe, finalized), peer count and sync status
//! - Run the queries concurrently so one slow call does not serialize the rest
//! - Report raw results; folding them into health state is done by the caller

use crate::blockchain::BlockTag;
use crate::health::state::ProbeOutcome;
use crate::load_balancer::backend::Backend;

/// Issues the health queries for one backend.
#[derive(Debug, Clone)]
pub struct Prober {
    skip_peer_count: bool,
}

impl Prober {
    pub fn new(skip_peer_count: bool) -> Self {
        Self { skip_peer_count }
    }

    /// Probe `backend` once.
    pub async fn probe(&self, backend: &Backend) -> ProbeOutcome {
        let client = backend.client();

        let peer_count = async {
            if self.skip_peer_count {
                None
            } else {
                Some(client.peer_count().await)
            }
        };

        let (latest, safe, finalized, peer_count, syncing) = tokio::join!(
            client.get_block_by_tag(BlockTag::Latest),
            client.get_block_by_tag(BlockTag::Safe),
            client.get_block_by_tag(BlockTag::Finalized),
            peer_count,
            client.syncing(),
        );

        let outcome = ProbeOutcome {
            latest,
            safe,
            finalized,
            peer_count,
            syncing,
        };

        match outcome.first_error() {
            Some(error) => tracing::warn!(
                backend = %backend.name,
                error = %error,
                "Probe failed"
            ),
            None => tracing::trace!(backend = %backend.name, "Probe succeeded"),
        }

        outcome
    }
}
