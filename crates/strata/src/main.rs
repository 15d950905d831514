//! Strata daemon - two-tier key-value storage path

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use strata_server::cache::LocalCache;
use strata_server::config::Config;
use strata_server::error::Result;
use strata_server::pressure::PressureMonitor;
use strata_server::server::{AppState, HttpServer};
use strata_server::service::{IngestionService, RetrievalService};
use strata_server::sweeper::OffloadSweeper;
use strata_server::tier::{ColdStore, FastTier, FsColdStore, MemoryFastTier};

/// Strata - two-tier key-value storage daemon
#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Two-tier key-value storage daemon with cache-aside reads and background offload")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,strata=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".strata").join("config.toml")),
        dirs::config_dir().map(|c| c.join("strata").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &PathBuf) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        strata_server::StrataError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| strata_server::StrataError::Config(format!("Failed to parse config: {e}")))
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting strata daemon");

    let config = load_config(config_path)?;
    tracing::debug!("Config loaded: {:?}", config);

    let fast: Arc<dyn FastTier> = Arc::new(MemoryFastTier::from_config(&config.fast_tier));
    tracing::info!(
        "Fast tier: {} partition(s) of {} bytes (nodes: {:?})",
        config.fast_tier.partition_count(),
        config.fast_tier.partition_max_bytes,
        config.fast_tier.bootstrap_nodes,
    );

    let cold: Arc<dyn ColdStore> = Arc::new(FsColdStore::new(&config.cold_tier.root));
    cold.ensure_root().await?;
    tracing::info!("Cold tier rooted at: {}", config.cold_tier.root.display());

    let cache = Arc::new(LocalCache::new(config.cache.enabled, config.cache.capacity));
    if cache.is_enabled() {
        tracing::info!("Local cache enabled, capacity {}", config.cache.capacity);
    } else {
        tracing::info!("Local cache disabled");
    }

    let op_timeout = Duration::from_secs(config.fast_tier.op_timeout_secs);
    let monitor = PressureMonitor::new(fast.clone(), op_timeout);
    let ingestion = IngestionService::new(
        fast.clone(),
        cold.clone(),
        cache.clone(),
        monitor,
        config.pressure.soft_ratio,
        op_timeout,
    );
    let retrieval = RetrievalService::new(fast.clone(), cold.clone(), cache.clone(), op_timeout);

    // The sweeper fails fast on an unreachable fast tier; the request path
    // starts regardless and falls back per request.
    let sweeper = OffloadSweeper::from_config(fast.clone(), cold.clone(), &config);
    let sweeper_handle = sweeper.start().await?;
    tracing::info!(
        "Sweeper started: offload_after={}s force_min_age={}s interval={}s force_ratio={}",
        config.sweeper.offload_after_secs,
        config.sweeper.force_min_age_secs,
        config.sweeper.interval_secs,
        config.pressure.force_ratio,
    );

    let state = Arc::new(AppState {
        ingestion,
        retrieval,
        fast,
    });
    let server = HttpServer::new(config.server.clone(), state);
    server.serve().await?;

    sweeper_handle.stop().await;
    tracing::info!("strata daemon stopped");
    Ok(())
}
