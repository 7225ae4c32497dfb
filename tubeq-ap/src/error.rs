//! Error types for tubeq-ap
//!
//! Fetch and playback failures are recorded per item and recovered from by the
//! queue engine; only `PlayerStart` is fatal to the service. Index and state
//! errors are caller mistakes and leave the queue untouched.

use thiserror::Error;

/// Main error type for tubeq-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Downloader failed or produced no output file
    #[error("Fetch failed for {id}: {reason}")]
    Fetch { id: String, reason: String },

    /// Player IPC transport or protocol error
    #[error("Player IPC error: {0}")]
    PlayerIpc(String),

    /// Player process could not be brought up
    #[error("Player start failed: {0}")]
    PlayerStart(String),

    /// Queue index outside `0..len`
    #[error("Index {index} out of bounds (queue length {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    /// Operation not valid for the item's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Track search failed
    #[error("Search error: {0}")]
    Search(String),

    /// Invalid request input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tubeq_common::Error> for Error {
    fn from(err: tubeq_common::Error) -> Self {
        match err {
            tubeq_common::Error::Io(e) => Error::Io(e),
            tubeq_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using tubeq-ap Error
pub type Result<T> = std::result::Result<T, Error>;
