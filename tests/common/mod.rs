//! Shared utilities for integration testing.
//!
//! `MockNode` is a programmable JSON-RPC node served by axum on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use consensus_proxy::config::{BackendConfig, BackendRole, ProxyConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct NodeState {
    latest: u64,
    safe: u64,
    finalized: u64,
    peer_count: u64,
    syncing: bool,
    failing: bool,
    delay: Duration,
    served: usize,
}

/// A mock blockchain node answering the probe queries and any other method.
#[derive(Clone)]
pub struct MockNode {
    pub name: String,
    pub addr: SocketAddr,
    state: Arc<Mutex<NodeState>>,
}

impl MockNode {
    /// Start a healthy node at height 0x101 / 0xe1 / 0xc1 with 10 peers.
    pub async fn start(name: &str) -> Self {
        let state = Arc::new(Mutex::new(NodeState {
            latest: 0x101,
            safe: 0xe1,
            finalized: 0xc1,
            peer_count: 10,
            syncing: false,
            failing: false,
            delay: Duration::ZERO,
            served: 0,
        }));

        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state((name.to_string(), state.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            name: name.to_string(),
            addr,
            state,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_heads(&self, latest: u64, safe: u64, finalized: u64) {
        let mut s = self.state.lock().unwrap();
        s.latest = latest;
        s.safe = safe;
        s.finalized = finalized;
    }

    pub fn set_peer_count(&self, peers: u64) {
        self.state.lock().unwrap().peer_count = peers;
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.state.lock().unwrap().syncing = syncing;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Number of non-probe requests this node has answered.
    pub fn served(&self) -> usize {
        self.state.lock().unwrap().served
    }
}

async fn handle_rpc(
    State((name, state)): State<(String, Arc<Mutex<NodeState>>)>,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    let delay = state.lock().unwrap().delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock().unwrap();
    if s.failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
    }

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let result = match method {
        "eth_getBlockByNumber" => {
            let height = match request["params"][0].as_str() {
                Some("safe") => s.safe,
                Some("finalized") => s.finalized,
                _ => s.latest,
            };
            block(height)
        }
        "net_peerCount" => json!(format!("{:#x}", s.peer_count)),
        "eth_syncing" if s.syncing => json!({
            "startingBlock": "0x0",
            "currentBlock": format!("{:#x}", s.latest),
            "highestBlock": format!("{:#x}", s.latest + 100),
        }),
        "eth_syncing" => json!(false),
        _ => {
            s.served += 1;
            json!(name)
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn block(height: u64) -> Value {
    json!({
        "number": format!("{height:#x}"),
        "hash": format!("0x{height:064x}"),
        "parentHash": format!("0x{:064x}", height.saturating_sub(1)),
    })
}

/// A config pointing at `nodes`, tuned for fast test cycles.
pub fn config(nodes: &[(&MockNode, BackendRole)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.backends = nodes
        .iter()
        .map(|(node, role)| BackendConfig {
            name: node.name.clone(),
            rpc_url: node.url(),
            role: *role,
            weight: 1,
        })
        .collect();
    config.consensus.poll_interval_ms = 100;
    config.consensus.cycle_timeout_ms = 500;
    config.consensus.rpc_timeout_ms = 400;
    config
}

/// POST a JSON-RPC call to `url` and return the status and body.
pub async fn rpc_call(url: &str, method: &str) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(url)
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": [] }))
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}
