use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::AdminState;
use crate::blockchain::BlockNumber;
use crate::config::BackendRole;
use crate::consensus::ConsensusView;
use crate::health::BanReason;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub group: String,
    pub backends: usize,
    pub cycle: u64,
    pub latest_block: BlockNumber,
    pub fallback_mode: bool,
    pub eligible: usize,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub role: BackendRole,
    pub weight: u32,
    pub rpc_url: String,
    pub latest_block: Option<BlockNumber>,
    pub safe_block: Option<BlockNumber>,
    pub finalized_block: Option<BlockNumber>,
    pub peer_count: Option<u64>,
    pub in_sync: bool,
    pub banned: bool,
    pub ban_reason: Option<BanReason>,
    pub consecutive_errors: u32,
    pub unreachable: bool,
    pub last_error: Option<String>,
    pub in_consensus: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.group.current_consensus();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        group: state.group.name().to_string(),
        backends: state.group.backends().len(),
        cycle: snapshot.cycle,
        latest_block: snapshot.heights.latest,
        fallback_mode: snapshot.fallback_mode,
        eligible: snapshot.eligible.len(),
    })
}

pub async fn get_consensus(State(state): State<AdminState>) -> Json<ConsensusView> {
    Json(state.group.current_consensus().view())
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let snapshot = state.group.current_consensus();
    let statuses = state
        .group
        .backends()
        .iter()
        .map(|backend| {
            let health = backend.health();
            BackendStatus {
                name: backend.name.clone(),
                role: backend.role,
                weight: backend.weight,
                rpc_url: backend.rpc_url().to_string(),
                latest_block: health.latest.as_ref().map(|b| b.number),
                safe_block: health.safe.as_ref().map(|b| b.number),
                finalized_block: health.finalized.as_ref().map(|b| b.number),
                peer_count: health.peer_count,
                in_sync: health.in_sync,
                banned: health.is_banned(),
                ban_reason: health.ban_reason,
                consecutive_errors: health.consecutive_errors,
                unreachable: health.unreachable,
                last_error: health.last_error.clone(),
                in_consensus: snapshot.contains(&backend.name),
            }
        })
        .collect();
    Json(statuses)
}

/// Run one poll cycle now and return the snapshot it published.
pub async fn force_update(
    State(state): State<AdminState>,
) -> Result<Json<ConsensusView>, StatusCode> {
    match state.group.force_update().await {
        Some(snapshot) => Ok(Json(snapshot.view())),
        None => Err(StatusCode::CONFLICT),
    }
}

pub async fn reset_consensus(State(state): State<AdminState>) -> Json<ConsensusView> {
    state.group.reset().await;
    Json(state.group.current_consensus().view())
}
