//! Stream lifecycle handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use sentinel_streams::{StartOutcome, StreamStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_confidence() -> f32 {
    0.25
}

#[derive(Debug, Deserialize, Validate)]
pub struct StreamStartRequest {
    /// Camera source (an MJPEG URL with the built-in connector).
    pub source: String,
    #[serde(default = "default_confidence")]
    #[validate(range(min = 0.1, max = 1.0))]
    pub confidence: f32,
    pub stream_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub stream_id: String,
}

#[derive(Serialize)]
pub struct StreamOpResponse {
    pub status: String,
    pub stream_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct StreamListResponse {
    pub streams: Vec<StreamStatus>,
    pub count: usize,
}

/// Start a stream worker; for a known stream id this acts as a heartbeat.
pub async fn start_stream(
    State(state): State<AppState>,
    Json(request): Json<StreamStartRequest>,
) -> ApiResult<Json<StreamOpResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let message = match state
        .streams
        .start(&request.source, &request.stream_id, request.confidence)
    {
        StartOutcome::Started => "Stream started",
        StartOutcome::AlreadyRunning => "Stream already active; heartbeat refreshed",
    };
    Ok(Json(StreamOpResponse {
        status: "success".to_string(),
        stream_id: request.stream_id,
        message: message.to_string(),
    }))
}

/// Full stream record; polling refreshes the heartbeat.
pub async fn stream_status(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> ApiResult<Json<StreamStatus>> {
    Ok(Json(state.streams.status(&stream_id)?))
}

/// Cancel the worker and remove the stream.
pub async fn stop_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> ApiResult<Json<StreamOpResponse>> {
    state.streams.stop(&stream_id)?;
    Ok(Json(StreamOpResponse {
        status: "success".to_string(),
        stream_id,
        message: "Stream stopped".to_string(),
    }))
}

/// Refresh a stream's heartbeat.
pub async fn stream_heartbeat(
    State(state): State<AppState>,
    Json(request): Json<HeartbeatRequest>,
) -> ApiResult<Json<StreamOpResponse>> {
    state.streams.heartbeat(&request.stream_id)?;
    Ok(Json(StreamOpResponse {
        status: "success".to_string(),
        stream_id: request.stream_id,
        message: "Heartbeat refreshed".to_string(),
    }))
}

/// List all registered streams.
pub async fn list_streams(State(state): State<AppState>) -> Json<StreamListResponse> {
    let streams = state.streams.list();
    Json(StreamListResponse {
        count: streams.len(),
        streams,
    })
}
