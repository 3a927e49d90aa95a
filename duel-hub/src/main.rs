//! Code Duel Hub (duel-hub) - Main entry point
//!
//! WebSocket coordinator for duel matches. Configuration comes from a TOML
//! file (see `duel_common::config`), with command-line overrides on top.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use duel_common::config::{load_config, TomlConfig};
use duel_common::events::EventBus;
use duel_common::shutdown::shutdown_signal;
use duel_hub::api::{self, AppContext};
use duel_hub::{spawn_eviction_task, MatchRegistry, Scorer, SessionHub};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for duel-hub
#[derive(Parser, Debug)]
#[command(name = "duel-hub")]
#[command(about = "Match coordinator for code duels")]
#[command(version)]
struct Args {
    /// Configuration file (overrides DUEL_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "DUEL_HUB_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "DUEL_HUB_PORT")]
    port: Option<u16>,

    /// Base URL of a duel-sc scoring service; scores inline when absent
    #[arg(long, env = "DUEL_SCORING_URL")]
    scoring_url: Option<String>,

    /// Evict matches idle for this many seconds
    #[arg(long)]
    match_ttl_secs: Option<u64>,
}

impl Args {
    fn apply(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.hub_port = port;
        }
        if self.scoring_url.is_some() {
            config.scoring_service_url = self.scoring_url;
        }
        if self.match_ttl_secs.is_some() {
            config.match_ttl_secs = self.match_ttl_secs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = args.apply(config);
    config.validate().context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("duel_hub={0},duel_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting duel-hub v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let scorer = Scorer::from_url(config.scoring_service_url.as_deref())
        .context("Failed to initialize scorer")?;
    info!("Scoring: {}", scorer.describe());

    let hub = Arc::new(SessionHub::new(
        Arc::new(MatchRegistry::new()),
        scorer,
        EventBus::new(config.event_bus_capacity),
    ));

    let eviction = match config.match_ttl() {
        Some(ttl) => Some(spawn_eviction_task(
            Arc::clone(&hub),
            ttl,
            config.eviction_interval(),
        )),
        None => {
            info!("Match eviction disabled");
            None
        }
    };

    let app = api::create_router(AppContext::new(hub));

    let addr: SocketAddr = format!("{}:{}", config.host, config.hub_port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.hub_port))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(task) = eviction {
        task.abort();
    }
    info!("Server shutdown complete");
    Ok(())
}
