//! Rewriting HTTP forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                 REWRITING PROXY                  │
//!                       │                                                  │
//!   GET /proxy?url=T    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ────────────────────┼─▶│  http   │──▶│ request  │──▶│   forward    │───┼──▶ Target T
//!                       │  │ server  │   │ validate │   │ fetch (15s)  │◀──┼─── response
//!                       │  └─────────┘   └──────────┘   └──────┬───────┘   │
//!                       │                                      │           │
//!                       │               text/html ┌────────────┼─────────┐ │
//!                       │               text/css  │ rewrite    ▼         │ │
//!                       │                         │ html → css → url     │ │
//!                       │                         └────────────┬─────────┘ │
//!   rewritten body      │                                      │           │
//!   or raw stream       │                  anything else: stream as-is     │
//!   ◀───────────────────┼──────────────────────────────────────┘           │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rewriting_proxy::config::{load_config, validation::validate_config, ConfigError, ProxyConfig};
use rewriting_proxy::http::HttpServer;
use rewriting_proxy::lifecycle::Shutdown;
use rewriting_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rewriting-proxy")]
#[command(about = "HTTP forward proxy that rewrites HTML and CSS to route resources through itself", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "rewriting-proxy starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        proxy_path = %config.upstream.proxy_path,
        upstream_timeout_secs = config.upstream.timeout_secs,
        static_root = %config.static_files.root,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
