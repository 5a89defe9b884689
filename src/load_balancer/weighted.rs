//! Weighted random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Picks a backend with probability proportional to its weight.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }

    fn pick(backends: &[Arc<Backend>], roll: u64) -> Option<Arc<Backend>> {
        let mut remaining = roll;
        for backend in backends {
            let weight = u64::from(backend.weight);
            if remaining < weight {
                return Some(backend.clone());
            }
            remaining -= weight;
        }
        backends.last().cloned()
    }
}

impl LoadBalancer for Weighted {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let total: u64 = backends.iter().map(|b| u64::from(b.weight)).sum();
        if total == 0 {
            return Some(backends[fastrand::usize(..backends.len())].clone());
        }
        Self::pick(backends, fastrand::u64(..total))
    }
}
