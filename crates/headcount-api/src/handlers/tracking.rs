//! Camera tracking handlers.
//!
//! Start and stop are idempotent: a second start for a live camera and a stop
//! for an unknown camera both answer `ok` with an explanatory message.

use axum::extract::{Path, State};
use axum::Json;
use headcount_models::StartRequest;
use headcount_worker::{StartOutcome, StopOutcome};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrackResponse {
    fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    fn with_message(message: &str) -> Self {
        Self {
            ok: true,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
}

/// Start counting on a camera, file or stream.
pub async fn start_tracking(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let spec = request.into_spec()?;
    info!(camera_id = %spec.camera_id, source = %spec.source, "Start requested");

    match state.registry.start(spec).await? {
        StartOutcome::Started => Ok(Json(TrackResponse::ok())),
        StartOutcome::AlreadyRunning => Ok(Json(TrackResponse::with_message("already running"))),
    }
}

/// Start counting on a recorded file; `filePath` is required and wins over
/// any stream URL in the body.
pub async fn start_mp4_tracking(
    state: State<AppState>,
    Json(mut request): Json<StartRequest>,
) -> ApiResult<Json<TrackResponse>> {
    let has_file = request
        .file_path
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    if !has_file {
        return Err(ApiError::bad_request("filePath is required for MP4 analytics"));
    }
    request.rtsp = None;
    request.hls_url = None;

    start_tracking(state, Json(request)).await
}

/// Stop a camera and wait until its source is released.
pub async fn stop_tracking(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Json<TrackResponse> {
    match state.registry.stop(&camera_id).await {
        StopOutcome::Stopped => Json(TrackResponse::ok()),
        StopOutcome::NotRunning => Json(TrackResponse::with_message("not running")),
    }
}

pub async fn tracking_status(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.registry.is_running(&camera_id).await,
    })
}
