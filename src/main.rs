//! Portfolio resource gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser / gateway-cli
//!            │  /api/<service>/<...path>?<query>
//!            ▼
//!     ┌──────────────────────────────────────────────┐
//!     │  http::server   request id · trace span       │
//!     │       │                                       │
//!     │       ▼                                       │
//!     │  routing        <service> → base URL          │
//!     │       │                                       │
//!     │       ▼                                       │
//!     │  http::request  allow-listed headers, body    │──────▶ Backend
//!     │  http::response hop-by-hop strip, cookies     │◀──────
//!     │                                               │
//!     │  config (TOML, hot reload) · observability    │
//!     │  lifecycle (signals, graceful shutdown)       │
//!     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use portfolio_gateway::config::{load_or_default, watcher::ConfigWatcher};
use portfolio_gateway::lifecycle::{signals, Shutdown};
use portfolio_gateway::observability::{logging, metrics};
use portfolio_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "portfolio-gateway", version, about = "Reverse proxy for the portfolio backend")]
struct Args {
    /// TOML configuration file; built-in defaults are used when absent.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portfolio-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
