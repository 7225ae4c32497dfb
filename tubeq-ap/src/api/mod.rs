//! REST API for the queue engine
//!
//! Thin layer: every handler decodes its request, calls one engine or search
//! operation, and maps the result onto a status code.

pub mod handlers;

use crate::engine::QueueEngine;
use crate::search::TrackSearch;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Queue engine
    pub engine: Arc<QueueEngine>,
    /// Track search backend
    pub search: Arc<dyn TrackSearch>,
    /// Web UI assets, served for any path without a route
    pub static_dir: Option<PathBuf>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::get_build_info))
        // Search and immediate playback
        .route("/api/search", get(handlers::search))
        .route("/api/play", post(handlers::play))
        .route("/api/play_batch", post(handlers::play_batch))
        // Transport
        .route("/api/control", post(handlers::control))
        .route("/api/status", get(handlers::get_status))
        .route("/api/playlist", get(handlers::get_playlist))
        // Queue
        .route("/api/queue", get(handlers::get_queue))
        .route("/api/queue/add", post(handlers::queue_add))
        .route("/api/queue/add_batch", post(handlers::queue_add_batch))
        .route("/api/queue/play", post(handlers::queue_play))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
