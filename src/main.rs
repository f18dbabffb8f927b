//! Service Gateway
//!
//! Bridges REST calls to a backend compute service over one persistent
//! TCP link.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                      GATEWAY                         │
//!                  │                                                      │
//!   HTTP request   │  ┌────────┐   ┌──────────┐   ┌────────┐   ┌───────┐  │
//!   ───────────────┼─▶│  http  │──▶│ fixtures │──▶│ mapper │──▶│  rpc  │  │
//!                  │  │ server │   │          │   │deadline│   │dispat-│  │
//!                  │  └────────┘   └──────────┘   │breaker │   │ cher  │  │
//!                  │                              └────────┘   └───┬───┘  │
//!                  │                                              │      │
//!                  │  ┌──────────────┐    ┌──────────────────┐    ▼      │
//!                  │  │ rpc handlers │◀───│  net link        │◀─ transport
//!                  │  │gateway_status│───▶│ reader / writer  │───────────┼──▶ Backend
//!                  │  └──────────────┘    └──────────────────┘           │
//!                  │                       ▲ manager: connect, supervise │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use service_gateway::config::validation::validate_config;
use service_gateway::config::{load_config, ConfigError, GatewayConfig};
use service_gateway::lifecycle::{bootstrap, wait_for_signal, Shutdown};
use service_gateway::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "service-gateway", version, about = "HTTP to TCP RPC gateway")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override the backend as `host:port`.
    #[arg(long)]
    backend: Option<String>,
}

fn resolve_config(args: &Args) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(backend) = &args.backend {
        let (host, port) = backend
            .rsplit_once(':')
            .ok_or_else(|| format!("--backend must be host:port, got {backend:?}"))?;
        config.backend.host = host.to_string();
        config.backend.port = port.parse()?;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address(),
        call_deadline_ms = config.timeouts.call_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let gateway = bootstrap(&config, &shutdown).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal.trigger();
    });

    gateway.serve(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
