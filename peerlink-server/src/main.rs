//! PeerLink server binary.
//!
//! Loads configuration, starts the merge scheduler, and serves the federation
//! API until interrupted.
//!
//! ## Environment
//!
//! - `PEERLINK_CONFIG`: path to the TOML configuration file
//! - `SERVER_HOST` / `SERVER_PORT`: listen address
//! - `PEERLINK_ADMIN_TOKEN`: bearer token for configuration writes
//! - `RUST_LOG`: log filter, `info,tower_http=warn` by default

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser};
use peerlink_config::{ConfigLoad, ConfigLoader};
use peerlink_server::{AppState, create_app, start_background_merges};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "peerlink-server")]
#[command(about = "Aggregates peer media catalogs and redirects playback")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to the configuration file (overrides PEERLINK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_server(cli.serve).await
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = args.config.clone() {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    if config.metadata.state_loaded {
        info!("federation settings restored from state file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(
                message = %warning.message,
                hint = %hint,
                "configuration warning"
            ),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let bind = (config.server.host.clone(), config.server.port);

    let state = AppState::from_config(config)?;
    info!(
        peers = state.federation.peers().len(),
        policy = ?state.federation.policy(),
        "federation configured"
    );
    start_background_merges(&state);

    let scheduler = state.scheduler.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind((bind.0.as_str(), bind.1))
        .await
        .with_context(|| format!("failed to bind {}:{}", bind.0, bind.1))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.shutdown().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
