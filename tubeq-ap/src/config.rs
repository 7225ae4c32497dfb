//! tubeq-ap specific configuration
//!
//! Resolved runtime view of the bootstrap [`TomlConfig`]: relative paths are
//! anchored at the working directory, the downloader is located, and
//! millisecond settings become `Duration`s.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tubeq_common::config::{absolutize, resolve_downloader, TomlConfig};

/// Audio Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub static_dir: PathBuf,
    pub downloader: PathBuf,
    pub cookies: PathBuf,
    pub pipeline_capacity: usize,
    pub player: PlayerSettings,
}

/// Settings for the player process and its IPC client
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub binary: PathBuf,
    pub socket_path: PathBuf,
    /// Downloader the player uses to resolve remote streams
    pub downloader: PathBuf,
    pub startup_timeout: Duration,
    pub startup_poll: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
}

impl PlayerSettings {
    /// Defaults for a player at `socket_path`
    pub fn new(binary: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            socket_path: socket_path.into(),
            downloader: PathBuf::from(tubeq_common::config::DEFAULT_DOWNLOADER),
            startup_timeout: Duration::from_millis(5000),
            startup_poll: Duration::from_millis(100),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            request_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_toml(toml: &TomlConfig, working_dir: &Path) -> Self {
        let downloader = resolve_downloader(toml.downloader_path.as_deref(), working_dir);

        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], toml.port)),
            cache_dir: absolutize(&toml.cache_dir, working_dir),
            static_dir: absolutize(&toml.static_dir, working_dir),
            cookies: absolutize(&toml.cookies_path, working_dir),
            pipeline_capacity: toml.pipeline_capacity,
            player: PlayerSettings {
                binary: toml.player_binary.clone(),
                socket_path: toml.socket_path.clone(),
                downloader: downloader.clone(),
                startup_timeout: Duration::from_millis(toml.player.startup_timeout_ms),
                startup_poll: Duration::from_millis(toml.player.startup_poll_ms),
                retry_attempts: toml.player.retry_attempts,
                retry_backoff: Duration::from_millis(toml.player.retry_backoff_ms),
                request_timeout: Duration::from_millis(toml.player.request_timeout_ms),
            },
            downloader,
        }
    }
}
