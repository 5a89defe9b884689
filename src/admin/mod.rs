//! Admin API.
//!
//! Bearer-token protected endpoints to inspect and drive the consensus poller.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::shutdown;
use crate::load_balancer::BackendGroup;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub group: Arc<BackendGroup>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/consensus", get(get_consensus))
        .route("/admin/backends", get(get_backends))
        .route("/admin/consensus/update", post(force_update))
        .route("/admin/consensus/reset", post(reset_consensus))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown::wait(shutdown))
        .await
}
