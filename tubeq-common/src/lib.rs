//! # tubeq Common Library
//!
//! Shared code for the tubeq services:
//! - Error type
//! - Bootstrap configuration loading and override resolution
//! - Queue item status state machine
//! - API request/response types

pub mod api;
pub mod config;
pub mod error;
pub mod queue_types;

pub use error::{Error, Result};
pub use queue_types::ItemStatus;
