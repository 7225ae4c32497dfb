//! Player control channel
//!
//! [`PlayerControl`] is the seam the queue engine drives. [`MpvPlayer`]
//! implements it over the player's JSON IPC endpoint and optionally owns the
//! supervised player process.

pub mod ipc;
pub mod process;

pub use ipc::{IpcClient, PropertyValue};
pub use process::{PlayerProcess, ProcessState};

use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One entry of the player's internal playlist
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub path: String,
    pub title: Option<String>,
    pub is_current: bool,
}

/// Commands the engine issues to the player
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Replace the playlist with `path` and start playing it
    async fn replace_and_play(&self, path: &Path, title: &str) -> Result<()>;

    /// Append `path` to the end of the playlist
    async fn append_to_playlist(&self, path: &Path, title: &str) -> Result<()>;

    async fn toggle_pause(&self) -> Result<()>;

    async fn skip_next(&self) -> Result<()>;

    async fn skip_previous(&self) -> Result<()>;

    async fn seek_absolute(&self, seconds: f64) -> Result<()>;

    /// Volume in percent
    async fn set_volume(&self, percent: f64) -> Result<()>;

    async fn get_property(&self, name: &str) -> Result<PropertyValue>;

    async fn playlist_snapshot(&self) -> Result<Vec<PlaylistEntry>>;
}

/// Player driven over JSON IPC
pub struct MpvPlayer {
    ipc: IpcClient,
    process: Mutex<Option<PlayerProcess>>,
}

impl MpvPlayer {
    /// Spawn the player process and wait for its IPC endpoint
    pub async fn launch(settings: PlayerSettings) -> Result<Self> {
        let mut process = PlayerProcess::new(settings.clone());
        process.start().await?;

        Ok(Self {
            ipc: IpcClient::new(&settings),
            process: Mutex::new(Some(process)),
        })
    }

    /// Talk to a player that is already listening at `settings.socket_path`
    pub fn attach(settings: &PlayerSettings) -> Self {
        Self {
            ipc: IpcClient::new(settings),
            process: Mutex::new(None),
        }
    }

    pub fn ipc(&self) -> &IpcClient {
        &self.ipc
    }

    /// Stop the owned player process, if any
    pub async fn shutdown(&self) {
        if let Some(process) = self.process.lock().await.as_mut() {
            process.stop().await;
        }
    }

    async fn command(&self, command: Vec<Value>) -> Result<()> {
        self.ipc.send_command(command).await
    }
}

fn path_arg(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// `loadfile` with the display title forced when one is known
fn loadfile(path: &Path, mode: &str, title: &str) -> Vec<Value> {
    let mut command = vec![json!("loadfile"), path_arg(path), json!(mode)];
    if !title.is_empty() {
        command.push(json!(format!("force-media-title={}", title)));
    }
    command
}

#[async_trait]
impl PlayerControl for MpvPlayer {
    async fn replace_and_play(&self, path: &Path, title: &str) -> Result<()> {
        info!(path = %path.display(), title = %title, "Replacing playlist");
        self.command(loadfile(path, "replace", title)).await
    }

    async fn append_to_playlist(&self, path: &Path, title: &str) -> Result<()> {
        debug!(path = %path.display(), title = %title, "Appending to playlist");
        self.command(loadfile(path, "append", title)).await
    }

    async fn toggle_pause(&self) -> Result<()> {
        self.command(vec![json!("cycle"), json!("pause")]).await
    }

    async fn skip_next(&self) -> Result<()> {
        self.command(vec![json!("playlist-next")]).await
    }

    async fn skip_previous(&self) -> Result<()> {
        self.command(vec![json!("playlist-prev")]).await
    }

    async fn seek_absolute(&self, seconds: f64) -> Result<()> {
        self.command(vec![json!("seek"), json!(seconds), json!("absolute")])
            .await
    }

    async fn set_volume(&self, percent: f64) -> Result<()> {
        self.command(vec![json!("set_property"), json!("volume"), json!(percent)])
            .await
    }

    async fn get_property(&self, name: &str) -> Result<PropertyValue> {
        self.ipc
            .request(vec![json!("get_property"), json!(name)])
            .await
    }

    async fn playlist_snapshot(&self) -> Result<Vec<PlaylistEntry>> {
        let value = self.get_property("playlist").await?;
        parse_playlist(&value)
    }
}

/// Decode the `playlist` property: a list of `{filename, title?, current?}`
pub fn parse_playlist(value: &PropertyValue) -> Result<Vec<PlaylistEntry>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let items = value
        .as_list()
        .ok_or_else(|| Error::PlayerIpc("playlist property is not a list".to_string()))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let path = item.get("filename")?.as_str()?.to_string();
            Some(PlaylistEntry {
                path,
                title: item
                    .get("title")
                    .and_then(PropertyValue::as_str)
                    .map(str::to_string),
                is_current: item
                    .get("current")
                    .and_then(PropertyValue::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect())
}
