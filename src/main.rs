//! Real-time push gateway.
//!
//! Accepts authenticated WebSocket connections, keeps one live session per
//! identity and fans alerts out to them on request from the admin API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client (WebSocket)                          Admin caller (HTTP/JSON)
//!            │                                              │
//!            ▼                                              ▼
//!     ┌─────────────┐    ┌─────────────┐            ┌──────────────┐
//!     │ http/ws     │───▶│  admission  │            │    admin     │
//!     │ upgrade     │    │state machine│            │   handlers   │
//!     └─────────────┘    └──────┬──────┘            └──────┬───────┘
//!                               │ register                 │
//!                               ▼                          ▼
//!                        ┌─────────────┐  snapshot  ┌──────────────┐
//!                        │   session   │◀───────────│   delivery   │
//!                        │  registry   │            │    engine    │
//!                        └─────────────┘            └──────────────┘
//!
//!     Cross-cutting: config (+ hot reload), auth (JWT + key bootstrap),
//!     observability, resilience (timeouts, backoff), lifecycle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use push_gateway::config::loader::load_config;
use push_gateway::config::watcher::ConfigWatcher;
use push_gateway::config::GatewayConfig;
use push_gateway::http::HttpServer;
use push_gateway::lifecycle::signals::spawn_signal_handler;
use push_gateway::lifecycle::{bootstrap, Shutdown};
use push_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "push-gateway", version, about = "Real-time push gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PUSH_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "push-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.websocket.path,
        max_connections = config.listener.max_connections,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let state = bootstrap(&config).await?;

    // Keep the watcher alive for the life of the process.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, state);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
