//! Fallback controller.
//!
//! # States
//! - Normal: routing goes to primary backends in the consensus group
//! - Fallback: routing goes to fallback-tier backends in the consensus group
//!
//! # State Transitions
//! ```text
//! Normal → Fallback: consensus group holds no primary backend
//! Fallback → Normal: consensus group holds a primary backend again
//! ```
//!
//! Decided once per poll cycle from the current group alone, without debounce.

use serde::Serialize;

use crate::config::BackendRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackState {
    #[default]
    Normal,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub state: FallbackState,
    /// Indices of backends eligible for routing, ascending.
    pub eligible: Vec<usize>,
    pub transitioned: bool,
}

#[derive(Debug, Default)]
pub struct FallbackController {
    state: FallbackState,
}

impl FallbackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = FallbackState::Normal;
    }

    /// Decide the routing tier for this cycle. `roles` is indexed by backend
    /// position; `members` are consensus group indices.
    pub fn decide(&mut self, members: &[usize], roles: &[BackendRole]) -> Decision {
        let has_role = |i: usize, role: BackendRole| roles.get(i) == Some(&role);

        let next = if members.iter().any(|&i| has_role(i, BackendRole::Primary)) {
            FallbackState::Normal
        } else {
            FallbackState::Fallback
        };

        let tier = match next {
            FallbackState::Normal => BackendRole::Primary,
            FallbackState::Fallback => BackendRole::Fallback,
        };
        let eligible = members
            .iter()
            .copied()
            .filter(|&i| has_role(i, tier))
            .collect();

        let transitioned = next != self.state;
        self.state = next;

        Decision {
            state: next,
            eligible,
            transitioned,
        }
    }
}
