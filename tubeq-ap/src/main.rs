//! tubeq Audio Player (tubeq-ap) - Main entry point
//!
//! Starts the external player, the fetch pipeline and the HTTP control API.
//! Configuration priority: command line, then `TUBEQ_*` environment
//! variables, then the TOML config file, then built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubeq_ap::api::{self, AppState};
use tubeq_ap::config::Config;
use tubeq_ap::fetcher::YtDlpFetcher;
use tubeq_ap::player::MpvPlayer;
use tubeq_ap::search::YtDlpSearch;
use tubeq_ap::QueueEngine;
use tubeq_common::config::{ConfigOverrides, TomlConfig};

/// How long shutdown waits for in-flight fetches
const PIPELINE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for tubeq-ap
#[derive(Parser, Debug)]
#[command(name = "tubeq-ap")]
#[command(about = "Queue and playback service driving an external audio player")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/tubeq/config.toml)
    #[arg(short, long, env = "TUBEQ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TUBEQ_PORT")]
    port: Option<u16>,

    /// Directory holding downloaded audio
    #[arg(long, env = "TUBEQ_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Web UI directory
    #[arg(long, env = "TUBEQ_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Downloader executable
    #[arg(long, env = "TUBEQ_DOWNLOADER")]
    downloader: Option<PathBuf>,

    /// Player executable
    #[arg(long, env = "TUBEQ_PLAYER")]
    player: Option<PathBuf>,

    /// Player IPC socket / pipe path
    #[arg(long, env = "TUBEQ_SOCKET")]
    socket: Option<PathBuf>,

    /// Cookies file passed to searches
    #[arg(long, env = "TUBEQ_COOKIES")]
    cookies: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "TUBEQ_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            cache_dir: self.cache_dir.clone(),
            static_dir: self.static_dir.clone(),
            downloader_path: self.downloader.clone(),
            player_binary: self.player.clone(),
            socket_path: self.socket.clone(),
            cookies_path: self.cookies.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config comes first so its log level can seed the filter
    let mut toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    toml_config.apply_overrides(args.overrides());

    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tubeq_ap={level},tubeq_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tubeq Audio Player v{}", env!("CARGO_PKG_VERSION"));

    let working_dir = std::env::current_dir().context("Failed to read working directory")?;
    let config = Config::from_toml(&toml_config, &working_dir);
    info!("Cache directory: {}", config.cache_dir.display());
    info!("Downloader: {}", config.downloader.display());

    let player = Arc::new(
        MpvPlayer::launch(config.player.clone())
            .await
            .context("Failed to start player")?,
    );

    let fetcher = YtDlpFetcher::new(config.downloader.clone(), config.cache_dir.clone())
        .context("Failed to create cache directory")?;
    let engine = Arc::new(QueueEngine::new(
        Arc::new(fetcher),
        player.clone(),
        config.pipeline_capacity,
    ));
    info!("Queue engine initialized");

    let static_dir = if config.static_dir.is_dir() {
        Some(config.static_dir.clone())
    } else {
        warn!(
            "Static directory {} not found, web UI disabled",
            config.static_dir.display()
        );
        None
    };

    let app = api::create_router(AppState {
        engine: engine.clone(),
        search: Arc::new(YtDlpSearch::new(
            config.downloader.clone(),
            Some(config.cookies.clone()),
        )),
        static_dir,
    });

    info!("Starting HTTP server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    if tokio::time::timeout(PIPELINE_DRAIN_TIMEOUT, engine.shutdown())
        .await
        .is_err()
    {
        warn!("Fetch pipeline still busy after {:?}, abandoning", PIPELINE_DRAIN_TIMEOUT);
    }
    player.shutdown().await;

    info!("Shutdown complete");
    served
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
