//! # tubeq Audio Player Library (tubeq-ap)
//!
//! Queue and playback coordination for an external player process.
//!
//! **Purpose:** Accept track requests, fetch their audio on demand through an
//! external downloader, and feed the results into an external player driven
//! over its JSON IPC socket. Provides an HTTP control interface.
//!
//! **Architecture:**
//! - [`identifier`]: stable short id for a locator
//! - [`fetcher`]: cache-aware, serialized downloader invocation
//! - [`search`]: downloader-backed track search
//! - [`player`]: player process supervision and IPC client
//! - [`engine`]: queue state machine and single-consumer fetch pipeline
//! - [`api`]: HTTP routes over the engine

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod identifier;
pub mod player;
pub mod search;

pub use engine::{EnqueueReceipt, QueueEngine, SkipOutcome};
pub use error::{Error, Result};
pub use tubeq_common::ItemStatus;
