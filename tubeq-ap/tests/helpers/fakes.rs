//! Player and fetcher doubles

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tubeq_ap::fetcher::AudioFetcher;
use tubeq_ap::player::{PlayerControl, PlaylistEntry, PropertyValue};
use tubeq_ap::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Replace(PathBuf, String),
    Append(PathBuf, String),
    TogglePause,
    Next,
    Previous,
    Seek(f64),
    Volume(f64),
}

/// Records every command; `path` follows the last successful replace
#[derive(Default)]
pub struct RecordingPlayer {
    calls: Mutex<Vec<PlayerCall>>,
    current_path: Mutex<Option<PathBuf>>,
    properties: Mutex<HashMap<String, PropertyValue>>,
    offline: AtomicBool,
    replace_gates: Mutex<HashMap<PathBuf, Arc<Notify>>>,
    failing_replaces: Mutex<HashSet<PathBuf>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every command fail as if the socket were gone
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_property(&self, name: &str, value: PropertyValue) {
        self.properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    /// Block replaces of `path` until the returned handle is notified
    ///
    /// The call is recorded before it blocks.
    pub fn hold_replace(&self, path: &Path) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.replace_gates
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), gate.clone());
        gate
    }

    /// Make replaces of `path` fail once they are let through
    pub fn fail_replace(&self, path: &Path) {
        self.failing_replaces
            .lock()
            .unwrap()
            .insert(path.to_path_buf());
    }

    /// Paths handed to replace, in call order
    pub fn replaced(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlayerCall::Replace(path, _) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Pretend the player moved on to `path` by itself
    pub fn set_current_path(&self, path: Option<&Path>) {
        *self.current_path.lock().unwrap() = path.map(Path::to_path_buf);
    }

    fn record(&self, call: PlayerCall) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::PlayerIpc("unreachable".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlayerControl for RecordingPlayer {
    async fn replace_and_play(&self, path: &Path, title: &str) -> Result<()> {
        self.record(PlayerCall::Replace(path.to_path_buf(), title.to_string()))?;

        let gate = self.replace_gates.lock().unwrap().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing_replaces.lock().unwrap().contains(path) {
            return Err(Error::PlayerIpc("loadfile rejected".to_string()));
        }

        self.set_current_path(Some(path));
        Ok(())
    }

    async fn append_to_playlist(&self, path: &Path, title: &str) -> Result<()> {
        self.record(PlayerCall::Append(path.to_path_buf(), title.to_string()))
    }

    async fn toggle_pause(&self) -> Result<()> {
        self.record(PlayerCall::TogglePause)
    }

    async fn skip_next(&self) -> Result<()> {
        self.record(PlayerCall::Next)
    }

    async fn skip_previous(&self) -> Result<()> {
        self.record(PlayerCall::Previous)
    }

    async fn seek_absolute(&self, seconds: f64) -> Result<()> {
        self.record(PlayerCall::Seek(seconds))
    }

    async fn set_volume(&self, percent: f64) -> Result<()> {
        self.record(PlayerCall::Volume(percent))
    }

    async fn get_property(&self, name: &str) -> Result<PropertyValue> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::PlayerIpc("unreachable".to_string()));
        }
        if name == "path" {
            return match self.current_path.lock().unwrap().as_ref() {
                Some(path) => Ok(PropertyValue::String(path.to_string_lossy().into_owned())),
                None => Err(Error::PlayerIpc("property unavailable".to_string())),
            };
        }
        self.properties
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PlayerIpc("property unavailable".to_string()))
    }

    async fn playlist_snapshot(&self) -> Result<Vec<PlaylistEntry>> {
        let current = self.current_path.lock().unwrap().clone();
        Ok(self
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PlayerCall::Replace(path, title) | PlayerCall::Append(path, title) => {
                    Some(PlaylistEntry {
                        is_current: current.as_deref() == Some(path.as_path()),
                        path: path.to_string_lossy().into_owned(),
                        title: Some(title),
                    })
                }
                _ => None,
            })
            .collect())
    }
}

/// Fetcher that resolves `<root>/<id>.m4a` without touching the disk
pub struct ScriptedFetcher {
    root: PathBuf,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl ScriptedFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Locators in the order fetches started
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, locator: &str) {
        self.failing.lock().unwrap().insert(locator.to_string());
    }

    /// Block fetches of `locator` until the returned handle is notified
    pub fn hold(&self, locator: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(locator.to_string(), gate.clone());
        gate
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.m4a", id))
    }
}

#[async_trait]
impl AudioFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str, id: &str) -> Result<PathBuf> {
        self.calls.lock().unwrap().push(locator.to_string());

        let gate = self.gates.lock().unwrap().get(locator).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(locator) {
            return Err(Error::Fetch {
                id: id.to_string(),
                reason: "video unavailable".to_string(),
            });
        }
        Ok(self.path_for(id))
    }
}
