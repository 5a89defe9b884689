//! Consensus-aware JSON-RPC proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                 CONSENSUS PROXY                  │
//!                      │                                                  │
//!   JSON-RPC request   │  ┌─────────┐   ┌──────────────┐                  │
//!   ───────────────────┼─▶│  http   │──▶│ backend group│──▶ eligible set ─┼──▶ Backend
//!                      │  │ server  │   │   (select)   │                  │
//!                      │  └─────────┘   └──────┬───────┘                  │
//!                      │                       │ snapshot                 │
//!                      │   poll tick   ┌───────┴──────┐   ┌───────────┐   │
//!                      │  ────────────▶│   prober ×N  │──▶│ consensus │   │
//!                      │               │   (health)   │   │ + fallback│   │
//!                      │               └──────────────┘   └───────────┘   │
//!                      │                                                  │
//!                      │  config · observability · lifecycle · admin      │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use consensus_proxy::admin::{self, AdminState};
use consensus_proxy::config::load_config;
use consensus_proxy::lifecycle::{signals, Shutdown};
use consensus_proxy::observability::{logging, metrics};
use consensus_proxy::{BackendGroup, HttpServer};

#[derive(Parser)]
#[command(name = "consensus-proxy", version)]
#[command(about = "Consensus-aware JSON-RPC proxy for redundant blockchain nodes")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "consensus-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        poll_interval_ms = config.consensus.poll_interval_ms,
        block_tolerance = config.consensus.block_tolerance,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let group = Arc::new(BackendGroup::from_config("main", &config)?);
    let poller = tokio::spawn(group.clone().run(shutdown.subscribe()));

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            group: group.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, group)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    poller.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
