//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Poll cycle (load_balancer::group):
//!     → prober.rs (query heads, peers, sync status of one backend)
//!     → state.rs (fold outcome into BackendHealth, apply ban policy)
//!     → consensus aggregator reads the new BackendHealth values
//! ```
//!
//! # Design Decisions
//! - Probing is I/O only; state transitions are pure and unit tested
//! - Failed queries keep stale values instead of zeroing them
//! - Bans are timestamps re-checked every cycle, no timers
//! - Health state is per-backend, never shared between backends

pub mod prober;
pub mod state;

pub use prober::Prober;
pub use state::{BackendHealth, BanReason, ProbeOutcome, ProbePolicy};
