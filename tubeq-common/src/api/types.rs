//! Shared API request/response types
//!
//! Used by the player service (tubeq-ap) and by any UI talking to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ItemStatus;

// ========================================
// Requests
// ========================================

/// A track submission: locator plus display title and an optional stable id
///
/// Body of `POST /api/play` and `POST /api/queue/add`, and one element of the
/// batch endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackRequest {
    /// Caller-supplied id. Empty means "derive one from the locator".
    #[serde(default)]
    pub id: String,

    /// Source locator (URL)
    #[serde(default)]
    pub url: String,

    /// Display title
    #[serde(default)]
    pub title: String,
}

impl TrackRequest {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            url: url.into(),
            title: title.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Playback control verbs accepted by `POST /api/control`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Toggle pause
    Pause,
    /// Same as pause (toggle)
    Resume,
    Next,
    Prev,
    Seek,
    Volume,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlRequest {
    pub action: ControlAction,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Body of `POST /api/queue/play`
///
/// Signed so that a negative index is reported as out of bounds rather than
/// rejected by the decoder.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct QueuePlayRequest {
    pub index: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// ========================================
// Responses
// ========================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// One queue entry as shown to clients
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueEntryInfo {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// This entry is the pending play target
    pub is_target: bool,
    pub added_at: DateTime<Utc>,
}

/// Now-playing snapshot
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerStatusResponse {
    pub title: String,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub paused: bool,
    /// Queue index of the item the player is on, if it could be matched
    pub index: Option<usize>,
}

/// One entry of the player's own playlist
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaylistEntryInfo {
    pub path: String,
    pub title: Option<String>,
    pub current: bool,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub url: String,
    pub thumbnail: String,
}
