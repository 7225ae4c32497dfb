//! HTTP request handlers

use super::AppState;
use crate::engine::{EnqueueReceipt, SkipOutcome};
use crate::error::Error;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};
use tubeq_common::api::types::{
    ControlAction, ControlRequest, PlayerStatusResponse, PlaylistEntryInfo, QueueEntryInfo,
    QueuePlayRequest, SearchQuery, SearchResult, StatusResponse, TrackRequest,
};

/// Title used by `/api/play` when the caller sends none
pub const UNKNOWN_TITLE: &str = "Unknown Track";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<StatusResponse>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    status: String,
    index: usize,
    id: String,
}

impl From<EnqueueReceipt> for EnqueueResponse {
    fn from(receipt: EnqueueReceipt) -> Self {
        Self {
            status: "ok".to_string(),
            index: receipt.index,
            id: receipt.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    status: String,
    queued: Vec<EnqueueReceipt>,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip: Option<SkipOutcome>,
}

impl ControlResponse {
    fn ok(skip: Option<SkipOutcome>) -> Self {
        Self {
            status: "ok".to_string(),
            skip,
        }
    }
}

/// Map an engine error onto a status code and `{"status": "error: ..."}`
fn error_response(e: Error) -> (StatusCode, Json<StatusResponse>) {
    let code = match &e {
        Error::BadRequest(_) | Error::IndexOutOfBounds { .. } | Error::InvalidState(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::PlayerIpc(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Service Endpoints
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tubeq-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /build_info
pub async fn get_build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("TUBEQ_GIT_HASH").to_string(),
        build_timestamp: env!("TUBEQ_BUILD_TIMESTAMP").to_string(),
        build_profile: env!("TUBEQ_BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Search and Playback
// ============================================================================

/// GET /api/search?q=<query>
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<SearchResult>> {
    if query.q.trim().is_empty() {
        return Err(error_response(Error::BadRequest("Missing query".to_string())));
    }
    state.search.search(&query.q).await.map(Json).map_err(error_response)
}

/// POST /api/play - queue a track and play it as soon as it is fetched
pub async fn play(
    State(state): State<AppState>,
    Json(mut request): Json<TrackRequest>,
) -> ApiResult<EnqueueResponse> {
    if request.title.trim().is_empty() {
        request.title = UNKNOWN_TITLE.to_string();
    }
    let receipt = state.engine.play_now(&request).await.map_err(error_response)?;
    info!(index = receipt.index, "Play requested");
    Ok(Json(receipt.into()))
}

/// POST /api/play_batch - play the first track, queue the rest behind it
pub async fn play_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<TrackRequest>>,
) -> ApiResult<BatchResponse> {
    let queued = state.engine.play_batch(&requests).await.map_err(error_response)?;
    Ok(Json(BatchResponse {
        status: "ok".to_string(),
        queued,
    }))
}

// ============================================================================
// Transport Control
// ============================================================================

/// POST /api/control
///
/// `pause` and `resume` both toggle. `seek` and `volume` require `value`.
pub async fn control(
    State(state): State<AppState>,
    Json(request): Json<ControlRequest>,
) -> ApiResult<ControlResponse> {
    let engine = &state.engine;
    let require_value = || {
        request.value.ok_or_else(|| {
            error_response(Error::BadRequest(format!(
                "action {:?} requires a value",
                request.action
            )))
        })
    };

    let skip = match request.action {
        ControlAction::Pause | ControlAction::Resume => {
            engine.toggle_pause().await.map_err(error_response)?;
            None
        }
        ControlAction::Next => Some(engine.next().await.map_err(error_response)?),
        ControlAction::Prev => Some(engine.previous().await.map_err(error_response)?),
        ControlAction::Seek => {
            let seconds = require_value()?;
            engine.seek_absolute(seconds).await.map_err(error_response)?;
            None
        }
        ControlAction::Volume => {
            let percent = require_value()?;
            engine.set_volume(percent).await.map_err(error_response)?;
            None
        }
    };

    Ok(Json(ControlResponse::ok(skip)))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<PlayerStatusResponse> {
    Json(state.engine.current_status_snapshot().await)
}

/// GET /api/playlist - the player's own playlist
pub async fn get_playlist(State(state): State<AppState>) -> ApiResult<Vec<PlaylistEntryInfo>> {
    let entries = state
        .engine
        .playlist_snapshot()
        .await
        .map_err(error_response)?;

    Ok(Json(
        entries
            .into_iter()
            .map(|entry| PlaylistEntryInfo {
                path: entry.path,
                title: entry.title,
                current: entry.is_current,
            })
            .collect(),
    ))
}

// ============================================================================
// Queue
// ============================================================================

/// GET /api/queue
pub async fn get_queue(State(state): State<AppState>) -> Json<Vec<QueueEntryInfo>> {
    Json(state.engine.queue_snapshot())
}

/// POST /api/queue/add
pub async fn queue_add(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> ApiResult<EnqueueResponse> {
    let receipt = state.engine.enqueue(&request).await.map_err(error_response)?;
    Ok(Json(receipt.into()))
}

/// POST /api/queue/add_batch
pub async fn queue_add_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<TrackRequest>>,
) -> ApiResult<BatchResponse> {
    let queued = state
        .engine
        .enqueue_batch(&requests)
        .await
        .map_err(error_response)?;
    Ok(Json(BatchResponse {
        status: "ok".to_string(),
        queued,
    }))
}

/// POST /api/queue/play {"index": n}
pub async fn queue_play(
    State(state): State<AppState>,
    Json(request): Json<QueuePlayRequest>,
) -> ApiResult<ControlResponse> {
    let outcome = state
        .engine
        .skip_to_index(request.index)
        .await
        .map_err(error_response)?;
    Ok(Json(ControlResponse::ok(Some(outcome))))
}
