//! Player process supervision
//!
//! Launches the player idle with its IPC endpoint enabled, waits for the
//! endpoint to appear, and terminates the process on shutdown.

use super::ipc::endpoint_ready;
use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long `stop` waits for the process to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// Handle on the external player process
pub struct PlayerProcess {
    settings: PlayerSettings,
    state: ProcessState,
    child: Option<Child>,
}

impl PlayerProcess {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            settings,
            state: ProcessState::NotStarted,
            child: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process id while a child is held
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Idle, no video output, best-audio stream selection, IPC endpoint, and
    /// the downloader path handed to the player's stream resolver
    pub fn launch_args(&self) -> Vec<OsString> {
        let mut socket_arg = OsString::from("--input-ipc-server=");
        socket_arg.push(&self.settings.socket_path);
        let mut script_opts = OsString::from("--script-opts=ytdl_hook-ytdl_path=");
        script_opts.push(&self.settings.downloader);

        vec![
            "--idle".into(),
            "--vo=null".into(),
            "--ytdl-format=bestaudio/best".into(),
            socket_arg,
            script_opts,
        ]
    }

    /// Spawn the player and wait until its IPC endpoint is usable
    ///
    /// Fails with [`Error::PlayerStart`] if the binary cannot be spawned, the
    /// process exits early, or the endpoint does not appear in time. A process
    /// that timed out is killed before returning.
    pub async fn start(&mut self) -> Result<()> {
        if matches!(self.state, ProcessState::Starting | ProcessState::Running) {
            return Err(Error::InvalidState(format!(
                "player process already {:?}",
                self.state
            )));
        }
        self.state = ProcessState::Starting;

        remove_stale_socket(&self.settings.socket_path);

        info!(
            binary = %self.settings.binary.display(),
            socket = %self.settings.socket_path.display(),
            "Starting player"
        );

        let mut child = match Command::new(&self.settings.binary)
            .args(self.launch_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.state = ProcessState::Stopped;
                return Err(Error::PlayerStart(format!(
                    "failed to spawn {}: {}",
                    self.settings.binary.display(),
                    e
                )));
            }
        };

        let deadline = Instant::now() + self.settings.startup_timeout;
        loop {
            tokio::time::sleep(self.settings.startup_poll).await;

            if endpoint_ready(&self.settings.socket_path).await {
                info!(pid = ?child.id(), "Player IPC endpoint ready");
                self.child = Some(child);
                self.state = ProcessState::Running;
                return Ok(());
            }

            if let Ok(Some(status)) = child.try_wait() {
                self.state = ProcessState::Stopped;
                return Err(Error::PlayerStart(format!(
                    "player exited during startup ({})",
                    status
                )));
            }

            if Instant::now() >= deadline {
                warn!(
                    timeout = ?self.settings.startup_timeout,
                    "Player IPC endpoint never appeared, killing process"
                );
                let _ = child.kill().await;
                self.state = ProcessState::Stopped;
                return Err(Error::PlayerStart(format!(
                    "IPC endpoint {} not ready within {:?}",
                    self.settings.socket_path.display(),
                    self.settings.startup_timeout
                )));
            }
        }
    }

    /// Terminate the player. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!(pid = ?child.id(), "Stopping player");
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "Player already gone");
            }
            if tokio::time::timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
                warn!("Player did not exit within {:?}", REAP_TIMEOUT);
            }
            remove_stale_socket(&self.settings.socket_path);
        }
        self.state = ProcessState::Stopped;
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Could not remove stale socket");
        }
    }
}

#[cfg(not(unix))]
fn remove_stale_socket(_path: &std::path::Path) {}
