//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        Some(backends[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_backend;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let b1 = Arc::new(test_backend(0, "b1", 1));
        let b2 = Arc::new(test_backend(1, "b2", 1));
        let backends = vec![b1.clone(), b2.clone()];

        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.name, b1.name);

        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.name, b2.name);

        let s3 = lb.next_server(&backends).unwrap();
        assert_eq!(s3.name, b1.name);
    }

    #[test]
    fn test_empty_set() {
        assert!(RoundRobin::new().next_server(&[]).is_none());
    }
}
