//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, weights > 0, URLs parse)
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendRole, ProxyConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("no primary backend configured")]
    NoPrimaryBackend,

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{name}' has invalid rpc_url '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("backend '{0}' has zero weight")]
    ZeroWeight(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("cycle_timeout_ms ({timeout}) exceeds poll_interval_ms ({interval})")]
    CycleTimeoutTooLong { timeout: u64, interval: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    } else if !config
        .backends
        .iter()
        .any(|b| b.role == BackendRole::Primary)
    {
        errors.push(ValidationError::NoPrimaryBackend);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        let url_ok = Url::parse(&backend.rpc_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !url_ok {
            errors.push(ValidationError::InvalidUrl {
                name: backend.name.clone(),
                url: backend.rpc_url.clone(),
            });
        }
        if backend.weight == 0 {
            errors.push(ValidationError::ZeroWeight(backend.name.clone()));
        }
    }

    let consensus = &config.consensus;
    if consensus.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroValue("consensus.poll_interval_ms"));
    }
    if consensus.cycle_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("consensus.cycle_timeout_ms"));
    }
    if consensus.rpc_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("consensus.rpc_timeout_ms"));
    }
    if consensus.max_consecutive_errors == 0 {
        errors.push(ValidationError::ZeroValue("consensus.max_consecutive_errors"));
    }
    if consensus.cycle_timeout_ms > consensus.poll_interval_ms && consensus.poll_interval_ms > 0 {
        errors.push(ValidationError::CycleTimeoutTooLong {
            timeout: consensus.cycle_timeout_ms,
            interval: consensus.poll_interval_ms,
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
