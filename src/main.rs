//! Static response server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │               STATIC RESPONSE                │
//!   Client Request     │  ┌─────────┐    ┌────────────┐               │
//!   ───────────────────┼─▶│  http   │───▶│   rules    │── match ──┐   │
//!                      │  │ server  │    │  dispatch  │           │   │
//!                      │  └─────────┘    └─────┬──────┘           ▼   │
//!                      │                       │ no match   ┌────────┐│
//!                      │                       ▼            │renderer││
//!                      │                ┌────────────┐      │json/tpl││
//!   Client Response    │                │  upstream  │      └───┬────┘│
//!   ◀──────────────────┼────────────────│  or 404    │◀─────────┘     │
//!                      │                └────────────┘                │
//!                      │  config (+watcher) · observability · lifecycle│
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use static_response::config::{load_rules, ConfigWatcher};
use static_response::lifecycle::{spawn_signal_handler, Shutdown};
use static_response::observability::{logging, metrics};
use static_response::HttpServer;

#[derive(Parser)]
#[command(name = "static-response")]
#[command(about = "Serve static responses for matching request paths", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "STATIC_RESPONSE_CONFIG", default_value = "static-response.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    Serve,
    /// Validate the configuration and compile its rules, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config).await,
        Commands::Check => {
            let (_, rules) = load_rules(&cli.config)?;
            println!("{}: {} rules OK", cli.config.display(), rules.len());
            Ok(())
        }
    }
}

async fn serve(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (config, rules) = load_rules(path)?;

    logging::init(&config.observability)?;
    tracing::info!("static-response v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = config.upstream.as_ref().map(|u| u.address.as_str()).unwrap_or("none"),
        request_timeout_secs = config.timeouts.request_secs,
        rules = rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (watcher, updates) = ConfigWatcher::new(path);
    // Dropping the handle stops the watcher.
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, rules);
    server.run(listener, updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
