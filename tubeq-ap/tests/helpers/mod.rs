//! Test helpers for tubeq-ap integration tests
//!
//! - [`fakes`]: in-process player and fetcher doubles
//! - [`fake_mpv`]: a unix socket server speaking the player's JSON IPC
//! - [`scripts`]: throwaway executables standing in for external tools

#![allow(dead_code)]

pub mod fake_mpv;
pub mod fakes;
pub mod scripts;

pub use fakes::{PlayerCall, RecordingPlayer, ScriptedFetcher};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tubeq_ap::QueueEngine;
use tubeq_common::api::types::TrackRequest;
use tubeq_common::ItemStatus;

/// Poll `cond` until it holds, panicking after five seconds
pub async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until item `index` reaches `status`
pub async fn wait_for_status(engine: &QueueEngine, index: usize, status: ItemStatus) {
    wait_for(&format!("item {} to be {}", index, status), || {
        engine.item_status(index) == Some(status)
    })
    .await;
}

/// Engine over fresh doubles
pub fn engine_with_fakes() -> (Arc<QueueEngine>, Arc<RecordingPlayer>, Arc<ScriptedFetcher>) {
    let player = Arc::new(RecordingPlayer::new());
    let fetcher = Arc::new(ScriptedFetcher::new("/cache"));
    let engine = Arc::new(QueueEngine::new(fetcher.clone(), player.clone(), 16));
    (engine, player, fetcher)
}

pub fn track(name: &str) -> TrackRequest {
    TrackRequest::new(format!("https://example.com/{}", name), name.to_uppercase()).with_id(name)
}
