//! Queue engine
//!
//! Owns the queue, the play target and the fetch pipeline, and translates
//! queue-level navigation into player commands.
//!
//! **Concurrency:**
//! - Queue state sits behind one mutex that is never held across an await
//! - Submissions reserve pipeline capacity first, then append and submit
//!   under the lock, so pipeline order always equals queue order
//! - The single pipeline worker is the only task that fetches

mod pipeline;
pub mod queue;

pub use queue::{QueueItem, QueueState};

use crate::error::{Error, Result};
use crate::fetcher::AudioFetcher;
use crate::identifier;
use crate::player::{PlayerControl, PlaylistEntry, PropertyValue};
use pipeline::{run_worker, EngineCore};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tubeq_common::api::types::{PlayerStatusResponse, QueueEntryInfo, TrackRequest};
use tubeq_common::ItemStatus;

/// Title reported when nothing is loaded
pub const IDLE_TITLE: &str = "Idle";

/// Where a submitted request landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    pub index: usize,
    pub id: String,
}

/// Result of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "index", rename_all = "snake_case")]
pub enum SkipOutcome {
    /// The item was handed to the player
    Playing(usize),
    /// The item is still being fetched and will play when ready
    Deferred(usize),
    /// Current position unknown; the player's own playlist navigation was used
    BlindSkip,
    /// Already at the first or last item
    EndOfQueue,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue engine
pub struct QueueEngine {
    core: Arc<EngineCore>,
    submit_tx: Mutex<Option<mpsc::Sender<usize>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueEngine {
    /// Create the engine and spawn its pipeline worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        player: Arc<dyn PlayerControl>,
        pipeline_capacity: usize,
    ) -> Self {
        let core = Arc::new(EngineCore::new(fetcher, player));
        let (tx, rx) = mpsc::channel(pipeline_capacity.max(1));
        let worker = tokio::spawn(run_worker(core.clone(), rx));

        Self {
            core,
            submit_tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Append a track; it is fetched in turn and appended to the player's
    /// playlist once ready
    pub async fn enqueue(&self, request: &TrackRequest) -> Result<EnqueueReceipt> {
        self.submit(request, false).await
    }

    /// Append a track and make it the play target
    ///
    /// The player is only touched once the track has been fetched, so the
    /// current track keeps playing meanwhile.
    pub async fn play_now(&self, request: &TrackRequest) -> Result<EnqueueReceipt> {
        self.submit(request, true).await
    }

    /// Enqueue several tracks in order, skipping entries without a locator
    pub async fn enqueue_batch(&self, requests: &[TrackRequest]) -> Result<Vec<EnqueueReceipt>> {
        let mut receipts = Vec::with_capacity(requests.len());
        for request in requests {
            if request.url.trim().is_empty() {
                debug!("Skipping batch entry without url");
                continue;
            }
            receipts.push(self.enqueue(request).await?);
        }
        Ok(receipts)
    }

    /// Play the first track of a batch now and enqueue the rest after it
    pub async fn play_batch(&self, requests: &[TrackRequest]) -> Result<Vec<EnqueueReceipt>> {
        let mut usable = requests.iter().filter(|r| !r.url.trim().is_empty());
        let Some(first) = usable.next() else {
            return Err(Error::BadRequest("No tracks with a url".to_string()));
        };

        let mut receipts = vec![self.play_now(first).await?];
        for request in usable {
            receipts.push(self.enqueue(request).await?);
        }
        Ok(receipts)
    }

    async fn submit(&self, request: &TrackRequest, as_target: bool) -> Result<EnqueueReceipt> {
        let locator = request.url.trim();
        if locator.is_empty() {
            return Err(Error::BadRequest("Missing URL".to_string()));
        }
        let id = identifier::resolve(locator, &request.id);

        let tx = relock(&self.submit_tx)
            .clone()
            .ok_or_else(|| Error::Internal("fetch pipeline is shut down".to_string()))?;
        let permit = tx
            .reserve()
            .await
            .map_err(|_| Error::Internal("fetch pipeline is shut down".to_string()))?;

        let index = {
            let mut state = self.core.lock();
            let index = state.push(id.clone(), locator.to_string(), request.title.clone());
            if as_target {
                state.set_play_target(Some(index));
            }
            permit.send(index);
            index
        };

        info!(index, id = %id, play_now = as_target, "Queued");
        Ok(EnqueueReceipt { index, id })
    }

    /// Play the item at `index`
    ///
    /// A fetched item is played immediately. An item still being fetched
    /// becomes the play target. Out-of-range indices and failed items are
    /// rejected without touching the queue or the player.
    ///
    /// A successful jump supersedes the play target that was pending when it
    /// was requested. If the player rejects the jump, that target is kept.
    pub async fn skip_to_index(&self, index: i64) -> Result<SkipOutcome> {
        let (index, prior_target) = {
            let mut state = self.core.lock();
            let index = state.checked_index(index)?;
            let status = state.items()[index].status();
            match status {
                ItemStatus::Ready | ItemStatus::Playing | ItemStatus::Played => {
                    (index, state.play_target())
                }
                ItemStatus::Pending | ItemStatus::Downloading => {
                    state.set_play_target(Some(index));
                    info!(index, "Skip target not fetched yet, deferring");
                    return Ok(SkipOutcome::Deferred(index));
                }
                ItemStatus::Error => {
                    let item = &state.items()[index];
                    return Err(Error::InvalidState(format!(
                        "item {} ({}) failed to fetch: {}",
                        index,
                        item.id,
                        item.error_detail().unwrap_or("unknown error")
                    )));
                }
            }
        };

        self.core.start_playback(index).await?;
        if let Some(prior) = prior_target {
            self.core.lock().clear_play_target_if(prior);
        }
        Ok(SkipOutcome::Playing(index))
    }

    /// Move to the item after the one now playing
    pub async fn next(&self) -> Result<SkipOutcome> {
        self.step(Direction::Forward).await
    }

    /// Move to the item before the one now playing
    pub async fn previous(&self) -> Result<SkipOutcome> {
        self.step(Direction::Backward).await
    }

    async fn step(&self, direction: Direction) -> Result<SkipOutcome> {
        let Some(current) = self.locate_now_playing().await else {
            warn!(?direction, "Now-playing item unknown, using player playlist navigation");
            match direction {
                Direction::Forward => self.core.player.skip_next().await?,
                Direction::Backward => self.core.player.skip_previous().await?,
            }
            return Ok(SkipOutcome::BlindSkip);
        };

        let len = self.core.lock().len();
        let target = match direction {
            Direction::Forward => current + 1,
            Direction::Backward => match current.checked_sub(1) {
                Some(target) => target,
                None => return Ok(SkipOutcome::EndOfQueue),
            },
        };
        if target >= len {
            return Ok(SkipOutcome::EndOfQueue);
        }

        self.skip_to_index(target as i64).await
    }

    /// Match the player's current path against fetched items
    ///
    /// A match is recorded as the playing item.
    async fn locate_now_playing(&self) -> Option<usize> {
        let path = match self.core.player.get_property("path").await {
            Ok(PropertyValue::String(path)) if !path.is_empty() => path,
            Ok(_) => return None,
            Err(e) => {
                debug!(error = %e, "Could not read player path");
                return None;
            }
        };

        let mut state = self.core.lock();
        let index = state.find_by_path(Path::new(&path))?;
        if state.get(index).is_some_and(|item| item.status() != ItemStatus::Playing) {
            if let Err(e) = state.mark_playing(index) {
                debug!(index, error = %e, "Could not reconcile now-playing item");
            }
        }
        Some(index)
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.core.player.toggle_pause().await
    }

    pub async fn seek_absolute(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::BadRequest(format!("Invalid seek position {}", seconds)));
        }
        self.core.player.seek_absolute(seconds).await
    }

    pub async fn set_volume(&self, percent: f64) -> Result<()> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(Error::BadRequest(format!("Invalid volume {}", percent)));
        }
        self.core.player.set_volume(percent).await
    }

    /// What the player is doing right now
    ///
    /// Never fails: properties the player cannot report fall back to idle
    /// defaults.
    pub async fn current_status_snapshot(&self) -> PlayerStatusResponse {
        let index = self.locate_now_playing().await;

        let title = match index.and_then(|i| self.core.lock().get(i).map(|item| item.title.clone())) {
            Some(title) if !title.is_empty() => title,
            _ => self
                .core
                .player
                .get_property("media-title")
                .await
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| IDLE_TITLE.to_string()),
        };

        let position_seconds = self.number_property("time-pos").await;
        let duration_seconds = self.number_property("duration").await;
        let paused = self
            .core
            .player
            .get_property("pause")
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        PlayerStatusResponse {
            title,
            position_seconds,
            duration_seconds,
            paused,
            index,
        }
    }

    async fn number_property(&self, name: &str) -> f64 {
        self.core
            .player
            .get_property(name)
            .await
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    pub fn queue_snapshot(&self) -> Vec<QueueEntryInfo> {
        self.core.lock().snapshot()
    }

    pub fn play_target(&self) -> Option<usize> {
        self.core.lock().play_target()
    }

    pub fn len(&self) -> usize {
        self.core.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.lock().is_empty()
    }

    /// Status of the item at `index`
    pub fn item_status(&self, index: usize) -> Option<ItemStatus> {
        self.core.lock().get(index).map(QueueItem::status)
    }

    /// The player's own playlist
    pub async fn playlist_snapshot(&self) -> Result<Vec<PlaylistEntry>> {
        self.core.player.playlist_snapshot().await
    }

    /// Stop accepting submissions and wait for the pipeline to drain
    pub async fn shutdown(&self) {
        relock(&self.submit_tx).take();
        let worker = relock(&self.worker).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Fetch pipeline task ended abnormally");
            }
        }
    }
}
