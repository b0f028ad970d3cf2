//! Occupancy handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use sentinel_counting::OccupancyMode;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct OccupancyResponse {
    /// The persistent (cumulative distinct entries) count; dashboards key
    /// off this regardless of the advisory reporting mode.
    pub current_occupancy: u64,
    pub live_occupancy: u64,
    pub total_entries: u64,
    pub total_exits: u64,
    pub zones_count: usize,
    pub active_tracks: usize,
}

/// Current occupancy statistics.
pub async fn get_occupancy(State(state): State<AppState>) -> Json<OccupancyResponse> {
    let snapshot = state.counting.lock().unwrap().occupancy();
    let zones_count = state.zones.read().unwrap().len();
    Json(OccupancyResponse {
        current_occupancy: snapshot.persistent_occupancy,
        live_occupancy: snapshot.live_occupancy,
        total_entries: snapshot.entry_count,
        total_exits: snapshot.exit_count,
        zones_count,
        active_tracks: snapshot.active_tracks,
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

/// Clear all counters and the tracked-people map.
pub async fn reset_occupancy(State(state): State<AppState>) -> Json<StatusResponse> {
    state.counting.lock().unwrap().reset();
    Json(StatusResponse {
        status: "success".to_string(),
        message: "Occupancy counters reset".to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    pub mode: String,
}

#[derive(Serialize)]
pub struct ModeResponse {
    pub status: String,
    pub mode: String,
}

/// Set the occupancy reporting mode.
pub async fn set_occupancy_mode(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
) -> ApiResult<Json<ModeResponse>> {
    let mode = query
        .mode
        .parse::<OccupancyMode>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.counting.lock().unwrap().set_mode(mode);
    Ok(Json(ModeResponse {
        status: "success".to_string(),
        mode: mode.to_string(),
    }))
}
