//! Fetch pipeline
//!
//! A single worker drains submitted indices in order and fetches each one.
//! Successful fetches are appended to the player's playlist, or played
//! immediately when the item is the play target. A failed play target hands
//! over to the next viable item.

use super::queue::QueueState;
use crate::error::{Error, Result};
use crate::fetcher::AudioFetcher;
use crate::player::PlayerControl;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tubeq_common::ItemStatus;

/// State and collaborators shared by the engine and its worker
pub(crate) struct EngineCore {
    state: Mutex<QueueState>,
    pub(crate) fetcher: Arc<dyn AudioFetcher>,
    pub(crate) player: Arc<dyn PlayerControl>,
}

impl EngineCore {
    pub(crate) fn new(fetcher: Arc<dyn AudioFetcher>, player: Arc<dyn PlayerControl>) -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
            fetcher,
            player,
        }
    }

    /// Never held across an await
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch one submitted item and hand the result to the player
    pub(crate) async fn process_item(&self, index: usize) {
        let (locator, id) = {
            let mut state = self.lock();
            let Some(item) = state.get_mut(index) else {
                warn!(index, "Submitted index not in queue");
                return;
            };
            if item.status() != ItemStatus::Pending {
                debug!(index, status = %item.status(), "Skipping item that is no longer pending");
                return;
            }
            if let Err(e) = item.transition(ItemStatus::Downloading) {
                warn!(index, error = %e, "Cannot start fetch");
                return;
            }
            (item.locator.clone(), item.id.clone())
        };

        debug!(index, id = %id, "Fetching");
        let result = self.fetcher.fetch(&locator, &id).await;

        match result {
            Err(e) => {
                error!(index, id = %id, error = %e, "Fetch failed");
                let was_target = {
                    let mut state = self.lock();
                    if let Some(item) = state.get_mut(index) {
                        if let Err(e) = item.mark_failed(e.to_string()) {
                            warn!(index, error = %e, "Could not record fetch failure");
                        }
                    }
                    state.play_target() == Some(index)
                };
                if was_target {
                    self.fallback_from(index).await;
                }
            }
            Ok(path) => {
                let (is_target, title) = {
                    let mut state = self.lock();
                    let Some(item) = state.get_mut(index) else {
                        return;
                    };
                    if let Err(e) = item.mark_ready(path.clone()) {
                        warn!(index, error = %e, "Could not record fetched file");
                        return;
                    }
                    let title = item.title.clone();
                    (state.play_target() == Some(index), title)
                };

                if is_target {
                    if let Err(e) = self.start_playback(index).await {
                        warn!(index, error = %e, "Play target failed to start");
                        self.fallback_from(index).await;
                    }
                } else if let Err(e) = self.player.append_to_playlist(&path, &title).await {
                    warn!(index, error = %e, "Could not append to player playlist");
                }
            }
        }
    }

    /// Replace the player's playlist with a fetched item and mark it playing
    ///
    /// Clears the play target if it still points at `index`.
    pub(crate) async fn start_playback(&self, index: usize) -> Result<()> {
        let (path, title) = {
            let state = self.lock();
            let item = state.get(index).ok_or(Error::IndexOutOfBounds {
                index: index as i64,
                len: state.len(),
            })?;
            let path = item.local_path().ok_or_else(|| {
                Error::InvalidState(format!("item {} ({}) has no local file", index, item.id))
            })?;
            (path.to_path_buf(), item.title.clone())
        };

        self.player.replace_and_play(&path, &title).await?;

        let mut state = self.lock();
        if let Err(e) = state.mark_playing(index) {
            warn!(index, error = %e, "Could not mark item playing");
        }
        state.clear_play_target_if(index);
        info!(index, title = %title, "Now playing");
        Ok(())
    }

    /// Move the play target past a failed item
    ///
    /// Scans forward for the first item that has not failed to fetch. An item
    /// still being fetched becomes the target and is played by the pipeline
    /// when ready. A fetched item is played now; if that fails too, the scan
    /// continues from it. Returns the item that ended up as target or playing,
    /// or `None` once the scan runs off the end.
    ///
    /// The scan only proceeds while the play target still points at the item
    /// being fallen back from. A target set by a newer request while the lock
    /// was released is left alone and the scan stops.
    pub(crate) async fn fallback_from(&self, failed: usize) -> Option<usize> {
        let mut from = failed;
        loop {
            let candidate = {
                let mut state = self.lock();
                if state.play_target() != Some(from) {
                    info!(
                        failed = from,
                        target = ?state.play_target(),
                        "Play target changed, abandoning fallback"
                    );
                    return None;
                }
                let Some(next) = state.next_viable_after(from) else {
                    info!(failed, "No viable item left to fall back to");
                    state.set_play_target(None);
                    return None;
                };
                state.set_play_target(Some(next));
                if state.get(next).is_some_and(|item| item.status().is_in_flight()) {
                    info!(failed, target = next, "Fallback target is still being fetched");
                    return Some(next);
                }
                next
            };

            info!(failed = from, target = candidate, "Falling back");
            match self.start_playback(candidate).await {
                Ok(()) => return Some(candidate),
                Err(e) => {
                    warn!(index = candidate, error = %e, "Fallback candidate failed to play");
                    from = candidate;
                }
            }
        }
    }
}

/// Drain the submission channel until every sender is gone
pub(crate) async fn run_worker(core: Arc<EngineCore>, mut rx: mpsc::Receiver<usize>) {
    info!("Fetch pipeline started");
    while let Some(index) = rx.recv().await {
        core.process_item(index).await;
    }
    info!("Fetch pipeline stopped");
}
