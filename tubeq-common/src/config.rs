//! Bootstrap configuration loading and override resolution
//!
//! Settings are resolved per field in this order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`TUBEQ_*`)
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! Steps 1 and 2 are collected by the binary into a [`ConfigOverrides`] and
//! applied on top of the loaded [`TomlConfig`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the external downloader when nothing else is configured
pub const DEFAULT_DOWNLOADER: &str = "yt-dlp";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a built-in default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Flat directory holding fetched audio, one file per id
    pub cache_dir: PathBuf,

    /// Directory served as static files for the web UI
    pub static_dir: PathBuf,

    /// Downloader executable. Unset means "./yt-dlp if present, else yt-dlp on PATH"
    pub downloader_path: Option<PathBuf>,

    /// Player executable
    pub player_binary: PathBuf,

    /// Player IPC endpoint (unix socket, or named pipe on Windows)
    pub socket_path: PathBuf,

    /// cookies.txt handed to the downloader for searches (used only if it exists)
    pub cookies_path: PathBuf,

    /// Maximum number of items waiting in the fetch pipeline
    pub pipeline_capacity: usize,

    pub logging: LoggingConfig,

    pub player: PlayerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

/// Player supervision and IPC timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Total time allowed for the IPC socket to appear after spawning
    pub startup_timeout_ms: u64,

    /// Interval between socket existence checks during startup
    pub startup_poll_ms: u64,

    /// Connection attempts for fire-and-forget commands
    pub retry_attempts: u32,

    /// Fixed delay between connection attempts
    pub retry_backoff_ms: u64,

    /// Deadline for a correlated request to receive its reply
    pub request_timeout_ms: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_dir: PathBuf::from("cache"),
            static_dir: PathBuf::from("web").join("static"),
            downloader_path: None,
            player_binary: PathBuf::from("mpv"),
            socket_path: default_socket_path(),
            cookies_path: PathBuf::from("cookies.txt"),
            pipeline_capacity: 100,
            logging: LoggingConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: 5000,
            startup_poll_ms: 100,
            retry_attempts: 3,
            retry_backoff_ms: 200,
            request_timeout_ms: 5000,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the per-user config file is
    /// read if present; a missing file falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading config from {}", path.display());
            return Self::from_toml_str(&std::fs::read_to_string(path)?);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(&path)?)
            }
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_capacity == 0 {
            return Err(Error::Config("pipeline_capacity must be at least 1".to_string()));
        }
        if self.player.retry_attempts == 0 {
            return Err(Error::Config("player.retry_attempts must be at least 1".to_string()));
        }
        if self.player.startup_poll_ms == 0 {
            return Err(Error::Config("player.startup_poll_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Apply command-line / environment overrides on top of the file values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(dir) = overrides.static_dir {
            self.static_dir = dir;
        }
        if let Some(path) = overrides.downloader_path {
            self.downloader_path = Some(path);
        }
        if let Some(path) = overrides.player_binary {
            self.player_binary = path;
        }
        if let Some(path) = overrides.socket_path {
            self.socket_path = path;
        }
        if let Some(path) = overrides.cookies_path {
            self.cookies_path = path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }
}

/// Values collected from command-line flags and environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub cache_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub downloader_path: Option<PathBuf>,
    pub player_binary: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub cookies_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Per-user config file location (`<config dir>/tubeq/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tubeq").join("config.toml"))
}

/// Default player IPC endpoint for the platform
pub fn default_socket_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"\\.\pipe\tubeq_mpv")
    } else {
        std::env::temp_dir().join("tubeq_mpv.sock")
    }
}

/// Resolve the downloader executable
///
/// Priority: configured path, then a `yt-dlp` binary in `working_dir`, then
/// `yt-dlp` looked up on `PATH`.
pub fn resolve_downloader(configured: Option<&Path>, working_dir: &Path) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    let local = working_dir.join(DEFAULT_DOWNLOADER);
    if local.is_file() {
        info!("Using local {}: {}", DEFAULT_DOWNLOADER, local.display());
        return local;
    }

    info!("Using system {}", DEFAULT_DOWNLOADER);
    PathBuf::from(DEFAULT_DOWNLOADER)
}

/// Make a possibly relative path absolute against `base`
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
