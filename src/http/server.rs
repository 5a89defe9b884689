//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind server to listener
//! - Dispatch each JSON-RPC request to a backend chosen by the group
//! - Relay the upstream status and body unchanged

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{peek_rpc, request_id, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::shutdown;
use crate::load_balancer::{BackendGroup, RequestContext};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub group: Arc<BackendGroup>,
    pub client: reqwest::Client,
}

/// JSON-RPC front end for one backend group.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, group: Arc<BackendGroup>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let state = AppState { group, client };
        Ok(Self {
            router: Self::build_router(config, state),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let x_request_id = header::HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/", post(proxy_handler))
            .route("/healthz", get(health_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(x_request_id))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward one JSON-RPC body to a backend from the current eligible set.
async fn proxy_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let info = peek_rpc(&body);
    let ctx = RequestContext {
        request_id: request_id(&headers),
        method: info.method,
    };

    let backend = match state.group.select_backend(&ctx) {
        Ok(backend) => backend,
        Err(_) => {
            metrics::record_request(&ctx.method, 503, "none", start);
            return response::no_backends(info.id);
        }
    };

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        backend = %backend.name,
        "Proxying request"
    );

    let upstream = state
        .client
        .post(backend.rpc_url().clone())
        .header(header::CONTENT_TYPE, "application/json")
        .header(X_REQUEST_ID, ctx.request_id.as_str())
        .body(body)
        .send()
        .await;

    let result = match upstream {
        Ok(resp) => {
            let status = resp.status();
            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("application/json"));
            resp.bytes().await.map(|bytes| (status, content_type, bytes))
        }
        Err(e) => Err(e),
    };

    match result {
        Ok((status, content_type, bytes)) => {
            metrics::record_request(&ctx.method, status.as_u16(), &backend.name, start);
            (status, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => {
            tracing::error!(
                request_id = %ctx.request_id,
                backend = %backend.name,
                error = %e,
                "Upstream error"
            );
            metrics::record_request(&ctx.method, 502, &backend.name, start);
            response::upstream_failed(info.id)
        }
    }
}

/// 200 while at least one backend is eligible, else 503.
async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.group.current_consensus();
    let status = if snapshot.eligible.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "unavailable" },
        "latest_block": snapshot.heights.latest,
        "eligible": snapshot.eligible.len(),
        "fallback_mode": snapshot.fallback_mode,
    });
    (status, Json(body)).into_response()
}
