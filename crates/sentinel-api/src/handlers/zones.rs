//! Zone configuration handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use sentinel_models::Zone;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ZoneUpdateRequest {
    pub zones: Vec<Zone>,
    pub camera_id: String,
}

#[derive(Serialize)]
pub struct ZoneUpdateResponse {
    pub status: String,
    pub message: String,
    pub zones_count: usize,
}

#[derive(Serialize)]
pub struct ZonesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    pub zones: Vec<Zone>,
    pub zones_count: usize,
}

/// Replace the active door zones for a camera, en bloc.
pub async fn update_zones(
    State(state): State<AppState>,
    Json(request): Json<ZoneUpdateRequest>,
) -> Json<ZoneUpdateResponse> {
    let mut zones = request.zones;
    let count = zones.len();
    for zone in &mut zones {
        if zone.camera_id.is_empty() {
            zone.camera_id = request.camera_id.clone();
        }
    }
    state.zones.write().unwrap().update(zones, &request.camera_id);

    Json(ZoneUpdateResponse {
        status: "success".to_string(),
        message: format!("Updated {count} zones for camera {}", request.camera_id),
        zones_count: count,
    })
}

/// All configured zones.
pub async fn get_zones(State(state): State<AppState>) -> Json<ZonesResponse> {
    let zones = state.zones.read().unwrap().to_vec();
    Json(ZonesResponse {
        camera_id: None,
        zones_count: zones.len(),
        zones,
    })
}

/// Zones for one camera (untagged zones apply everywhere).
pub async fn get_camera_zones(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Json<ZonesResponse> {
    let zones = state.zones.read().unwrap().for_camera(&camera_id);
    Json(ZonesResponse {
        camera_id: Some(camera_id),
        zones_count: zones.len(),
        zones,
    })
}
