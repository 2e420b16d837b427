//! folio-guard service.
//!
//! # Architecture Overview
//!
//! ```text
//!   SPA / SSR frontend handlers
//!            │
//!            ▼
//!  ┌──────────────────────────────────────────────────────────┐
//!  │                      folio-guard                          │
//!  │                                                           │
//!  │  request id → trace → body limit → timeout → metrics      │
//!  │        → csrf ──▶ /v1/rate-limit/{preset} ──▶ store       │
//!  │               ──▶ /v1/validate-url                        │
//!  │               ──▶ /admin/* (bearer auth)                  │
//!  │                                                           │
//!  │  config watcher ──▶ ArcSwap (csrf allow-list, admin key)  │
//!  └──────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use folio_guard::config::{load_config, watcher::ConfigWatcher, ConfigOverrides, GuardConfig};
use folio_guard::lifecycle::startup::open_store;
use folio_guard::observability::{logging, metrics};
use folio_guard::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "folio-guard")]
#[command(about = "Rate limiting, SSRF and CSRF checks for the portfolio frontends")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        bind_address: args.bind,
    };
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    overrides.apply(&mut config);

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "folio-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        csrf_enabled = config.csrf.enabled,
        admin_enabled = config.admin.enabled,
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

    // Keep the watcher handle alive for the life of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, overrides);
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let store = open_store(&config.rate_limit);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, store.clone());
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to save rate limit snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
