//! Consensus tracking subsystem.
//!
//! # Data Flow
//! ```text
//! BackendHealth of every backend (after a poll cycle)
//!     → aggregator.rs (agreed latest/safe/finalized + consensus group)
//!     → fallback.rs (Normal/Fallback, eligible routing set)
//!     → snapshot.rs (immutable ConsensusSnapshot, swapped in atomically)
//! ```
//!
//! # Design Decisions
//! - Aggregation and fallback decisions are pure functions of their inputs
//! - Safe and finalized heights never move backwards
//! - "No candidates" keeps the previous heights instead of reporting zero

pub mod aggregator;
pub mod fallback;
pub mod snapshot;

pub use aggregator::{aggregate, Aggregate, BackendView};
pub use fallback::{Decision, FallbackController, FallbackState};
pub use snapshot::{ConsensusSnapshot, ConsensusView, Heights};
