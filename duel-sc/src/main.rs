//! duel-sc (Scoring) - Similarity scoring service
//!
//! Stateless HTTP wrapper around the Similarity Engine. The hub calls it
//! when `scoring_service_url` is configured.

use anyhow::{Context, Result};
use clap::Parser;
use duel_common::config::load_config;
use duel_common::shutdown::shutdown_signal;
use duel_sc::{serve, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for duel-sc
#[derive(Parser, Debug)]
#[command(name = "duel-sc")]
#[command(about = "Similarity scoring service for code duels")]
#[command(version)]
struct Args {
    /// Configuration file (overrides DUEL_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "DUEL_SC_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "DUEL_SC_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("duel_sc={0},duel_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting duel-sc v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.scoring_port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("duel-sc listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    serve(listener, AppState::default(), shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
